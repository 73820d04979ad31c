//! The deferred loader.
//!
//! Runs on a detached thread, decoupled from process startup. The delay
//! lets the target finish its own early initialization before foreign code
//! activates in the freshly specialized process. There is no cancellation;
//! if the process exits first the thread dies with it.

use std::path::Path;
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, warn};

use crate::activate::Activator;
use crate::module::InjectionDecision;

/// Staged side-car names end in `.config.so` next to a gadget marker. Located
/// at cleanup time by pattern, independent of whatever name staging used.
fn sidecar_cleanup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r".*-gadget.*\.config\.so$").expect("static cleanup pattern"))
}

/// Spawn the loader on its own thread. The caller drops the handle to detach;
/// tests join it.
pub fn spawn_deferred_load(
    decision: InjectionDecision,
    primary: Box<dyn Activator + Send>,
    fallback: Box<dyn Activator + Send>,
) -> JoinHandle<()> {
    thread::spawn(move || run_deferred_load(&decision, primary.as_ref(), fallback.as_ref()))
}

/// Wait out the delay, then activate the staged payload and clean up.
///
/// Every early return here is silent by contract: activation is best-effort
/// and must never surface a fault into the host process.
pub fn run_deferred_load(decision: &InjectionDecision, primary: &dyn Activator, fallback: &dyn Activator) {
    debug!(
        component = "LOADER",
        target_dir = %decision.target_dir,
        payload = %decision.payload_name,
        delay_micros = decision.delay_micros,
        "deferred load scheduled"
    );
    thread::sleep(Duration::from_micros(u64::from(decision.delay_micros)));

    let target_dir = decision.target_dir.trim_end_matches('/');
    if target_dir.is_empty() {
        warn!(component = "LOADER", "target directory unknown, skipping injection");
        return;
    }

    let payload_path = Path::new(target_dir).join(&decision.payload_name);
    if !payload_path.exists() {
        // Another actor already consumed or removed it; nothing to do.
        debug!(component = "LOADER", ?payload_path, "payload no longer present");
        return;
    }

    let activated = match primary.activate(&payload_path) {
        Ok(()) => {
            debug!(component = "LOADER", strategy = primary.name(), "payload activated");
            true
        }
        Err(err) => {
            warn!(
                component = "LOADER",
                %err,
                strategy = primary.name(),
                "primary activation failed, trying fallback"
            );
            match fallback.activate(&payload_path) {
                Ok(()) => {
                    debug!(component = "LOADER", strategy = fallback.name(), "payload activated");
                    true
                }
                Err(err) => {
                    error!(
                        component = "LOADER",
                        %err,
                        strategy = fallback.name(),
                        "payload failed to activate"
                    );
                    false
                }
            }
        }
    };

    // Staged files are removed only after a successful load. On failure they
    // stay put so permissions and ownership can be inspected.
    if activated {
        cleanup_staged_files(Path::new(target_dir), &payload_path);
    }
}

fn cleanup_staged_files(target_dir: &Path, payload_path: &Path) {
    if let Err(err) = std::fs::remove_file(payload_path) {
        warn!(component = "LOADER", %err, ?payload_path, "could not remove staged payload");
    }

    let sidecar_name = find_matching_file(target_dir, sidecar_cleanup_pattern());
    if !sidecar_name.is_empty() {
        let sidecar_path = target_dir.join(sidecar_name);
        if let Err(err) = std::fs::remove_file(&sidecar_path) {
            warn!(component = "LOADER", %err, ?sidecar_path, "could not remove staged side-car");
        }
    }
}

fn find_matching_file(dir: &Path, pattern: &Regex) -> String {
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
