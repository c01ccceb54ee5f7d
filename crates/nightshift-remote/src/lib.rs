//! Nightshift Remote - Remote build execution
//!
//! Build targets are driven through a [`RemoteExecutor`], which opens one
//! [`RemoteSession`] per build invocation. The [`RemoteBuildInvoker`] runs a
//! build for a chosen revision pair and stores the returned log artifacts in
//! the run's log directory.

mod invoker;
mod session;
pub mod ssh;
mod traits;

pub use invoker::{BuildMeta, RemoteBuildInvoker};
pub use session::SessionGuard;
pub use ssh::SshExecutor;
pub use traits::{BuildRequest, RemoteExecutor, RemoteSession};
