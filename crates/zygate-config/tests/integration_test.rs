//! Integration tests for zygate-config
//!
//! These verify the record loading pipeline against real files, the way the
//! companion reads them.

use tempfile::tempdir;
use zygate_config::{ConfigRecord, RecordError};

#[test]
fn test_load_record_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config");

    let contents = r#"{
        "package": {
            "name": "com.example.target",
            "delay": 150000,
            "mode": { "config": true }
        }
    }"#;
    std::fs::write(&path, contents).unwrap();

    let record = ConfigRecord::load(&path).unwrap();
    assert_eq!(record.target_name(), "com.example.target");
    assert_eq!(record.delay_micros(), 150_000);
    assert!(record.config_mode());
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = tempdir().unwrap();
    let err = ConfigRecord::load(temp.path().join("no-such-record")).unwrap_err();
    assert!(matches!(err, RecordError::Io(_)));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config");
    std::fs::write(&path, "delay=300000").unwrap();

    let err = ConfigRecord::load(&path).unwrap_err();
    assert!(matches!(err, RecordError::Json(_)));
}
