//! # zygate-config
//!
//! The target-selection record consumed by the companion.
//!
//! The record is a small JSON document written by an external authoring tool
//! and read, never written, by the companion. One parse per specialization
//! event; the parsed record is immutable.
//!
//! ```json
//! {
//!     "package": {
//!         "name": "com.example.app",
//!         "delay": 300000,
//!         "mode": { "config": false }
//!     }
//! }
//! ```

pub mod logging;

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Target-selection record. Field layout mirrors the on-disk contract of the
/// authoring tool; all fields are required.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRecord {
    pub package: PackageSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageSpec {
    /// Package name of the process to inject into.
    pub name: String,
    /// Microseconds to wait after specialization before activating.
    pub delay: u32,
    pub mode: ModeSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeSpec {
    /// Whether a side-car gadget configuration file should be staged
    /// alongside the payload.
    pub config: bool,
}

impl ConfigRecord {
    /// Load and parse the record at `path`.
    ///
    /// Any failure (missing file, unreadable, malformed, missing fields) is
    /// fatal to the current specialization event only.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        debug!(component = "COMPANION", ?path, "loading target record");
        let contents = std::fs::read_to_string(path)?;
        let record = serde_json::from_str(&contents)?;
        Ok(record)
    }

    pub fn target_name(&self) -> &str {
        &self.package.name
    }

    pub fn delay_micros(&self) -> u32 {
        self.package.delay
    }

    pub fn config_mode(&self) -> bool {
        self.package.mode.config
    }
}
