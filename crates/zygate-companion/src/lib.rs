//! # zygate-companion
//!
//! The privileged companion side of the injection handshake.
//!
//! One connection = one specialization event. The exchange is fixed:
//!
//! 1. hook sends the target-record path
//! 2. companion parses the record (abort silently on any failure)
//! 3. companion sends the target package name
//! 4. hook sends its match decision (false, or a bare close, ends the event)
//! 5. hook sends its private-storage directory ("" = unknown)
//! 6. companion sends the activation delay
//! 7. companion stages payload (+ optional side-car) and sends the staged
//!    payload filename, only after copy and ownership fix have completed,
//!    so the hook never activates a partially written file. An empty name
//!    tells the hook staging failed.
//!
//! Events share nothing mutable: each one reads the record fresh and writes
//! only into its own target's directory, so concurrent events isolate by
//! directory, not by locking.

pub mod locate;
pub mod stage;

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};
use zygate_config::ConfigRecord;
use zygate_ipc::aio;

/// Drive one specialization event over an accepted channel.
///
/// Every failure path returns without a word: the hook observes the closed
/// channel as an empty read and skips injection for this event. Nothing here
/// is fatal to the companion process.
pub async fn serve_connection<S>(stream: &mut S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let record_path = aio::read_string(stream).await;
    if record_path.is_empty() {
        return;
    }

    let record = match ConfigRecord::load(&record_path) {
        Ok(record) => record,
        Err(err) => {
            warn!(component = "COMPANION", %err, %record_path, "unusable target record");
            return;
        }
    };

    if aio::write_string(stream, record.target_name()).await.is_err() {
        return;
    }

    // A false decision and a peer that closed without answering are the same
    // clean mismatch; the hook owes us nothing past this point.
    match aio::read_bool(stream).await {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            debug!(
                component = "COMPANION",
                target = record.target_name(),
                "process is not the target"
            );
            return;
        }
    }

    let app_dir = normalize_dir(&aio::read_string(stream).await);
    let app_dir = if app_dir.is_empty() {
        let fallback = format!("/data/data/{}", record.target_name());
        warn!(
            component = "COMPANION",
            %fallback, "target directory not provided, using default location"
        );
        fallback
    } else {
        app_dir
    };

    if aio::write_u32(stream, record.delay_micros()).await.is_err() {
        return;
    }

    let staged_name = stage_event(&record, &record_path, Path::new(&app_dir));

    // Sent last, after all staging work: the ordering is what makes the
    // staged file safe to activate on the other side.
    let _ = aio::write_string(stream, &staged_name).await;
}

/// Locate and stage the payload (and side-car, in config mode) into
/// `app_dir`. Returns the staged payload filename, or empty on failure.
pub fn stage_event(record: &ConfigRecord, record_path: &str, app_dir: &Path) -> String {
    let module_dir = match Path::new(record_path).parent() {
        Some(dir) => dir,
        None => return String::new(),
    };

    let payload_name = locate::find_payload(module_dir);
    if payload_name.is_empty() {
        error!(
            component = "COMPANION",
            ?module_dir,
            arch = locate::ARCH_TAG,
            "no payload for this architecture in module dir"
        );
        return String::new();
    }

    if record.config_mode() {
        let sidecar_name = locate::find_sidecar(module_dir);
        if sidecar_name.is_empty() {
            warn!(
                component = "COMPANION",
                ?module_dir,
                "config mode enabled but no side-car file in module dir"
            );
        } else {
            let src = module_dir.join(&sidecar_name);
            let dst = app_dir.join(stage::sidecar_dest_name(&payload_name));
            debug!(component = "COMPANION", ?src, ?dst, "staging side-car");
            match stage::copy_file(&src, &dst) {
                Ok(()) => stage::align_owner(&dst, app_dir),
                // Side-car staging is best-effort; the payload still goes in.
                Err(err) => warn!(component = "COMPANION", %err, "side-car staging failed"),
            }
        }
    }

    let src = module_dir.join(&payload_name);
    let dst = app_dir.join(&payload_name);
    debug!(component = "COMPANION", ?src, ?dst, "staging payload");
    match stage::copy_file(&src, &dst) {
        Ok(()) => {
            stage::align_owner(&dst, app_dir);
            info!(component = "COMPANION", payload = %payload_name, "payload staged");
            payload_name
        }
        Err(err) => {
            error!(component = "COMPANION", %err, "payload staging failed");
            String::new()
        }
    }
}

/// Strip trailing slashes; `"/data/user/0/pkg/"` and `"/data/user/0/pkg"`
/// name the same directory.
pub fn normalize_dir(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_record(dir: &Path, name: &str, delay: u32, config_mode: bool) -> String {
        let path = dir.join("config");
        let contents = format!(
            r#"{{"package": {{"name": "{name}", "delay": {delay}, "mode": {{"config": {config_mode}}}}}}}"#
        );
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir("/data/user/0/pkg//"), "/data/user/0/pkg");
        assert_eq!(normalize_dir("/data/user/0/pkg"), "/data/user/0/pkg");
        assert_eq!(normalize_dir(""), "");
        assert_eq!(normalize_dir("///"), "");
    }

    #[test]
    fn test_stage_event_copies_payload() {
        let module = tempdir().unwrap();
        let app = tempdir().unwrap();
        let payload = format!("example-gadget-16.1.4-android-{}.so", locate::ARCH_TAG);
        std::fs::write(module.path().join(&payload), b"payload-bytes").unwrap();
        let record_path = write_record(module.path(), "com.example.app", 0, false);
        let record = ConfigRecord::load(&record_path).unwrap();

        let staged = stage_event(&record, &record_path, app.path());
        assert_eq!(staged, payload);
        assert_eq!(
            std::fs::read(app.path().join(&payload)).unwrap(),
            b"payload-bytes"
        );
    }

    #[test]
    fn test_stage_event_stages_sidecar_in_config_mode() {
        let module = tempdir().unwrap();
        let app = tempdir().unwrap();
        let payload = format!("example-gadget-16.1.4-android-{}.so", locate::ARCH_TAG);
        std::fs::write(module.path().join(&payload), b"payload").unwrap();
        std::fs::write(module.path().join("example-gadget.config"), b"sidecar").unwrap();
        let record_path = write_record(module.path(), "com.example.app", 0, true);
        let record = ConfigRecord::load(&record_path).unwrap();

        let staged = stage_event(&record, &record_path, app.path());
        assert_eq!(staged, payload);

        let sidecar_dst = app.path().join(stage::sidecar_dest_name(&payload));
        assert_eq!(std::fs::read(sidecar_dst).unwrap(), b"sidecar");
    }

    #[test]
    fn test_stage_event_missing_sidecar_is_nonfatal() {
        let module = tempdir().unwrap();
        let app = tempdir().unwrap();
        let payload = format!("example-gadget-16.1.4-android-{}.so", locate::ARCH_TAG);
        std::fs::write(module.path().join(&payload), b"payload").unwrap();
        let record_path = write_record(module.path(), "com.example.app", 0, true);
        let record = ConfigRecord::load(&record_path).unwrap();

        // Config mode without a side-car: warn and stage the payload anyway.
        let staged = stage_event(&record, &record_path, app.path());
        assert_eq!(staged, payload);
        assert!(app.path().join(&payload).exists());
    }

    #[test]
    fn test_stage_event_no_payload_is_empty() {
        let module = tempdir().unwrap();
        let app = tempdir().unwrap();
        let record_path = write_record(module.path(), "com.example.app", 0, false);
        let record = ConfigRecord::load(&record_path).unwrap();

        assert_eq!(stage_event(&record, &record_path, app.path()), "");
        assert_eq!(std::fs::read_dir(app.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stage_event_copy_failure_is_empty() {
        let module = tempdir().unwrap();
        let payload = format!("example-gadget-16.1.4-android-{}.so", locate::ARCH_TAG);
        std::fs::write(module.path().join(&payload), b"payload").unwrap();
        let record_path = write_record(module.path(), "com.example.app", 0, false);
        let record = ConfigRecord::load(&record_path).unwrap();

        let missing_app_dir = module.path().join("does-not-exist");
        assert_eq!(stage_event(&record, &record_path, &missing_app_dir), "");
    }
}
