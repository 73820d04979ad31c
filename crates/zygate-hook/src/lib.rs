//! # zygate-hook
//!
//! The in-process side of selective payload injection.
//!
//! The host framework loads this module into the generic pre-specialization
//! process and invokes two lifecycle entry points on it: before
//! specialization, where the module runs the companion handshake and decides
//! whether this process is the target, and after specialization, where a
//! matched module hands off to a detached deferred loader. Everything the
//! module needs from its host comes through the [`host::HostBridge`]
//! capability; the module never calls the host's lifecycle itself.
//!
//! Nothing in here may take the host process down: every failure degrades to
//! "skip injection for this event".

pub mod activate;
pub mod host;
pub mod loader;
pub mod module;

pub use activate::{ActivateError, Activator, CanonicalPathActivator, DlopenActivator};
pub use host::{dir_from_raw_fd, HostBridge, SocketBridge};
pub use module::{AppSpecializeContext, GadgetModule, InjectionDecision};
