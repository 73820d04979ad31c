//! Payload activation capabilities.
//!
//! Activation is opaque to the rest of the hook: an [`Activator`] either
//! brings the staged payload live in this process or reports why it could
//! not. The deferred loader tries a primary strategy and, only after it
//! fails, a fallback.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActivateError {
    #[error("dlopen failed: {0}")]
    Dlopen(String),
    #[error("cannot resolve {path}: {source}")]
    Resolve { path: PathBuf, source: io::Error },
}

pub trait Activator {
    /// Strategy name, for log lines only.
    fn name(&self) -> &'static str;

    fn activate(&self, path: &Path) -> Result<(), ActivateError>;
}

/// Primary strategy: load the staged path directly with `RTLD_NOW`.
pub struct DlopenActivator;

impl Activator for DlopenActivator {
    fn name(&self) -> &'static str {
        "dlopen"
    }

    fn activate(&self, path: &Path) -> Result<(), ActivateError> {
        dlopen_now(path)
    }
}

/// Fallback strategy for private-directory path aliasing: the same storage
/// can be reachable under two canonical prefixes (`/data/user/0` vs
/// `/data/data`), and the loader may refuse the aliased spelling. Retry
/// through the resolved physical path.
pub struct CanonicalPathActivator;

impl Activator for CanonicalPathActivator {
    fn name(&self) -> &'static str {
        "canonical-path"
    }

    fn activate(&self, path: &Path) -> Result<(), ActivateError> {
        let resolved = path.canonicalize().map_err(|source| ActivateError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;
        dlopen_now(&resolved)
    }
}

fn dlopen_now(path: &Path) -> Result<(), ActivateError> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ActivateError::Dlopen("path contains NUL".to_string()))?;

    unsafe { libc::dlerror() }; // clear any stale error state first
    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW) };
    if handle.is_null() {
        let err = unsafe { libc::dlerror() };
        let msg = if err.is_null() {
            "(null)".to_string()
        } else {
            unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
        };
        return Err(ActivateError::Dlopen(msg));
    }

    // The handle is never closed; the payload stays resident for the rest
    // of the process lifetime.
    Ok(())
}
