//! The module the host's lifecycle drives.
//!
//! `pre_app_specialize` runs the whole handshake synchronously and must
//! finish before the host specializes the process: the mismatch path has to
//! request self-unload while the host can still honor it.
//! `post_app_specialize` only reads what the first phase decided.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use zygate_ipc::{read_string, read_u32, write_bool, write_string};

use crate::activate::{CanonicalPathActivator, DlopenActivator};
use crate::host::HostBridge;
use crate::loader;

/// Snapshot of the host's specialization arguments.
#[derive(Debug, Clone, Default)]
pub struct AppSpecializeContext {
    /// The package name this process is becoming, if the host knows it.
    pub process_name: Option<String>,
    /// The process's private storage directory, if the host knows it.
    pub app_data_dir: Option<PathBuf>,
}

/// What the handshake decided. Built entirely before specialization and
/// read-only afterwards; `None` on the module means injection is off for
/// this process.
#[derive(Debug, Clone)]
pub struct InjectionDecision {
    /// Target private-storage directory; may be empty ("unknown"), in which
    /// case the loader aborts rather than guess.
    pub target_dir: String,
    pub delay_micros: u32,
    /// Staged payload filename inside `target_dir`.
    pub payload_name: String,
}

pub struct GadgetModule<B: HostBridge> {
    bridge: B,
    decision: Option<InjectionDecision>,
}

impl<B: HostBridge> GadgetModule<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            decision: None,
        }
    }

    /// The handshake result, if this process matched.
    pub fn decision(&self) -> Option<&InjectionDecision> {
        self.decision.as_ref()
    }

    /// Pre-specialization entry point: run the companion handshake.
    ///
    /// Runs synchronously to completion; the host expects the decision to be
    /// settled when this returns. Any abort leaves the module disabled and
    /// the host process untouched.
    pub fn pre_app_specialize(&mut self, ctx: &AppSpecializeContext) {
        let process_name = match ctx.process_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!(component = "HOOK", "skipping unnamed process");
                return;
            }
        };

        let mut stream = match self.bridge.connect_companion() {
            Ok(stream) => stream,
            Err(err) => {
                warn!(component = "HOOK", %err, "cannot reach companion");
                return;
            }
        };

        let record_path = self.bridge.module_dir().join("config");
        if write_string(&mut stream, &record_path.to_string_lossy()).is_err() {
            return;
        }

        let target_name = read_string(&mut stream);
        if target_name.is_empty() {
            // Companion aborted (unusable record) or the channel broke;
            // either way this process is not getting injected. Same exit as
            // a mismatch: nothing for this module to do here, ever.
            self.bridge.request_self_unload();
            return;
        }

        if target_name != process_name {
            let _ = write_bool(&mut stream, false);
            self.bridge.request_self_unload();
            return;
        }

        info!(component = "HOOK", process = process_name, "process is the injection target");
        if write_bool(&mut stream, true).is_err() {
            return;
        }

        let target_dir = ctx
            .app_data_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        if write_string(&mut stream, &target_dir).is_err() {
            return;
        }

        let delay_micros = match read_u32(&mut stream) {
            Ok(delay) => delay,
            Err(err) => {
                warn!(component = "HOOK", %err, "companion dropped the channel mid-handshake");
                return;
            }
        };

        let payload_name = read_string(&mut stream);
        if payload_name.is_empty() {
            warn!(
                component = "HOOK",
                "companion could not stage a payload, skipping injection"
            );
            return;
        }

        self.decision = Some(InjectionDecision {
            target_dir,
            delay_micros,
            payload_name,
        });
    }

    /// Post-specialization entry point: hand off to the deferred loader.
    ///
    /// Returns immediately; the loader thread is detached and owns nothing
    /// of the host's startup path.
    pub fn post_app_specialize(&mut self, _ctx: &AppSpecializeContext) {
        if let Some(decision) = self.decision.clone() {
            let handle = loader::spawn_deferred_load(
                decision,
                Box::new(DlopenActivator),
                Box::new(CanonicalPathActivator),
            );
            drop(handle);
        }
    }
}
