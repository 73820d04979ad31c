//! Payload and side-car location inside the module directory.
//!
//! The module directory holds up to four architecture-specific payloads named
//! `<prefix>-gadget-<version>-android-<arch>.so` and at most one side-car
//! configuration file ending in `-gadget.config`. Which payload applies is
//! fixed by the instruction set this process runs on, not configurable.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Architecture tag of the running process. One of four; anything else is an
/// unsupported build target for this system.
#[cfg(target_arch = "arm")]
pub const ARCH_TAG: &str = "arm";
#[cfg(target_arch = "aarch64")]
pub const ARCH_TAG: &str = "arm64";
#[cfg(target_arch = "x86")]
pub const ARCH_TAG: &str = "x86";
#[cfg(target_arch = "x86_64")]
pub const ARCH_TAG: &str = "x86_64";

/// Payload naming pattern for a given architecture tag.
pub fn payload_pattern_for(tag: &str) -> Regex {
    Regex::new(&format!(r".*-gadget.*{tag}\.so$")).expect("static payload pattern")
}

fn payload_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| payload_pattern_for(ARCH_TAG))
}

fn sidecar_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r".*-gadget\.config$").expect("static side-car pattern"))
}

/// First filename in `dir` (immediate entries only) matching `pattern`.
/// Empty string when nothing matches or the directory is unreadable: that is
/// "nothing to stage", not an error.
pub fn find_matching_file(dir: &Path, pattern: &Regex) -> String {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return String::new(),
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if pattern.is_match(&name) {
            return name.into_owned();
        }
    }
    String::new()
}

/// Payload filename for the running architecture, or empty.
pub fn find_payload(module_dir: &Path) -> String {
    find_matching_file(module_dir, payload_pattern())
}

/// Side-car configuration filename, or empty.
pub fn find_sidecar(module_dir: &Path) -> String {
    find_matching_file(module_dir, sidecar_pattern())
}
