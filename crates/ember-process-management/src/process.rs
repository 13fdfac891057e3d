//! Capabilities of a managed process.
//!
//! The controller drives a process only through these traits, so a fake can
//! stand in for [`EmbeddedServer`](crate::server::EmbeddedServer) in tests.

use async_trait::async_trait;
use ember_common::{ProcessResult, StopError};
use ember_logging::LogContext;
use ember_management::ManagementClient;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Something that can be launched.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Begin booting. Returns once boot is under way, not once it finished;
    /// readiness is observed through the probes of [`ManagedProcess`].
    async fn launch(&mut self) -> ProcessResult<()>;
}

/// Something that can be terminated.
#[async_trait]
pub trait Stoppable: Send + Sync {
    /// Release everything the process holds. Best effort: problems are
    /// returned, never raised.
    async fn terminate(&mut self) -> Vec<StopError>;
}

/// A launchable, terminable process with a management tree and a log
/// context.
pub trait ManagedProcess: Startable + Stoppable + fmt::Debug {
    fn is_booted(&self) -> bool;

    /// Reason the boot failed, if it did.
    fn boot_failure(&self) -> Option<String>;

    /// A new client bound to this process's management tree.
    fn management_client(&self) -> ProcessResult<ManagementClient>;

    fn log_context(&self) -> Option<Arc<LogContext>>;

    /// Where the bootstrap file handler writes.
    fn server_log_path(&self) -> PathBuf;
}
