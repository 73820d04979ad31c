//! Capabilities the hook needs from its host framework.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// What the host must provide. The host owns the module's lifetime; the
/// module only ever asks, never acts on the host directly.
pub trait HostBridge {
    /// Open the channel to the companion for this specialization event.
    fn connect_companion(&self) -> io::Result<UnixStream>;

    /// Directory holding the target record and the payload files.
    fn module_dir(&self) -> PathBuf;

    /// Ask the host to drop this module from the process image. Called when
    /// this process is not the target; the module must not stay resident in
    /// a process it will never act on.
    fn request_self_unload(&self);
}

/// Bridge for hosts that expose the companion on the well-known socket and
/// act on unload requests after the pre-specialization callback returns.
pub struct SocketBridge {
    module_dir: PathBuf,
    unload_requested: AtomicBool,
}

impl SocketBridge {
    pub fn new(module_dir: PathBuf) -> Self {
        Self {
            module_dir,
            unload_requested: AtomicBool::new(false),
        }
    }

    /// Whether the module asked to be unloaded during the handshake.
    pub fn unload_requested(&self) -> bool {
        self.unload_requested.load(Ordering::Relaxed)
    }
}

impl HostBridge for SocketBridge {
    fn connect_companion(&self) -> io::Result<UnixStream> {
        UnixStream::connect(zygate_ipc::socket_path())
    }

    fn module_dir(&self) -> PathBuf {
        self.module_dir.clone()
    }

    fn request_self_unload(&self) {
        self.unload_requested.store(true, Ordering::Relaxed);
    }
}

/// Resolve a directory handed over as an open descriptor into a path.
///
/// Some hosts pass the module directory as a raw fd rather than a path;
/// `/proc/self/fd` carries its name. Consumes (closes) the descriptor.
pub fn dir_from_raw_fd(fd: libc::c_int) -> Option<PathBuf> {
    let resolved = std::fs::read_link(format!("/proc/self/fd/{fd}")).ok();
    unsafe { libc::close(fd) };
    resolved
}
