//! File staging into the target's private directory.
//!
//! The companion runs privileged, so everything it creates defaults to the
//! privileged identity. The sandboxed target cannot read such files, so after
//! each copy the destination's ownership is aligned with the owner of the
//! target directory itself.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid};
use thiserror::Error;
use tracing::warn;

const COPY_BUF_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("error opening source file {path}: {source}")]
    OpenSource { path: PathBuf, source: io::Error },
    #[error("error opening destination file {path}: {source}")]
    OpenDest { path: PathBuf, source: io::Error },
    #[error("error reading from source file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("error writing to destination file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Stream `src` into `dst` through a bounded buffer.
///
/// A failure aborts this copy only; the caller decides whether the event can
/// continue with whatever else was staged.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), StageError> {
    let mut src_file = File::open(src).map_err(|source| StageError::OpenSource {
        path: src.to_path_buf(),
        source,
    })?;
    let mut dst_file = File::create(dst).map_err(|source| StageError::OpenDest {
        path: dst.to_path_buf(),
        source,
    })?;

    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = src_file.read(&mut buf).map_err(|source| StageError::Read {
            path: src.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        dst_file
            .write_all(&buf[..n])
            .map_err(|source| StageError::Write {
                path: dst.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

/// Align `file`'s owner with the owner of `dir`.
///
/// Failures are logged and swallowed: a file left with the wrong owner simply
/// fails to load later, and the loader's failure path reports that.
pub fn align_owner(file: &Path, dir: &Path) {
    let st = match nix::sys::stat::stat(dir) {
        Ok(st) => st,
        Err(err) => {
            warn!(component = "COMPANION", %err, ?dir, "stat failed, leaving ownership as-is");
            return;
        }
    };
    let uid = Uid::from_raw(st.st_uid);
    let gid = Gid::from_raw(st.st_gid);
    if let Err(err) = nix::unistd::chown(file, Some(uid), Some(gid)) {
        warn!(
            component = "COMPANION",
            %err,
            ?file,
            uid = st.st_uid,
            gid = st.st_gid,
            "chown failed, target may not be able to read the staged file"
        );
    }
}

/// Destination filename for the side-car: the payload's final extension is
/// replaced with `.config.<ext>` so activation logic expecting a
/// same-basename side-car can find it.
pub fn sidecar_dest_name(payload_name: &str) -> String {
    match payload_name.rfind('.') {
        Some(idx) => format!(
            "{}.config.{}",
            &payload_name[..idx],
            &payload_name[idx + 1..]
        ),
        None => format!("{payload_name}.config"),
    }
}
