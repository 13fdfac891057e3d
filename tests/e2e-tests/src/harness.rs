//! A started-or-startable embedded server with its own log directory.

use ember_common::{ProcessKind, ProcessResult};
use ember_logging::{CapturedConsole, LoggingAddresses, Logger};
use ember_management::ManagementClient;
use ember_process_management::{
    readiness, Configuration, ControllerOptions, LoggerHint, ProcessHandle,
    ProcessLifecycleController, StopOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Readiness timeout used by the scenarios.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TestServer {
    pub dir: TempDir,
    pub console: CapturedConsole,
    pub controller: ProcessLifecycleController,
    pub handle: ProcessHandle,
    pub hint: LoggerHint,
}

impl TestServer {
    /// Create (not start) a server with console capture enabled.
    pub fn create(kind: ProcessKind, hint: LoggerHint) -> Self {
        let dir = TempDir::new().expect("Failed to create test directory");
        let console = CapturedConsole::new();
        let controller = ProcessLifecycleController::with_options(ControllerOptions {
            poll_interval: Duration::from_millis(10),
            console: Arc::new(console.clone()),
        });
        let config = Configuration::builder()
            .logger_hint(hint)
            .log_directory(dir.path().join("log"))
            .console_capture_enabled(true)
            .build()
            .expect("Invalid test configuration");
        let handle = match kind {
            ProcessKind::Standalone => controller.create(config),
            ProcessKind::HostController => controller.create_host_controller(config),
        }
        .expect("Failed to create process handle");

        Self {
            dir,
            console,
            controller,
            handle,
            hint,
        }
    }

    /// Create and start, gated on `server.log` existing.
    pub async fn started(kind: ProcessKind, hint: LoggerHint) -> Self {
        let mut server = Self::create(kind, hint);
        server.start().await.expect("Server failed to start");
        server
    }

    pub async fn start(&mut self) -> ProcessResult<()> {
        self.controller
            .start(&mut self.handle, readiness::server_log_exists(), STARTUP_TIMEOUT)
            .await
    }

    pub async fn stop(&mut self) -> StopOutcome {
        self.controller.stop(&mut self.handle).await
    }

    pub fn log_dir(&self) -> PathBuf {
        self.handle.configuration().log_directory.clone()
    }

    pub fn server_log(&self) -> PathBuf {
        self.handle.server_log_path()
    }

    pub fn client(&self) -> &ManagementClient {
        self.handle
            .management_client()
            .expect("Server is not running")
    }

    pub fn addresses(&self) -> LoggingAddresses {
        LoggingAddresses::for_kind(self.handle.kind()).expect("Invalid logging addresses")
    }

    pub fn logger(&self, category: &str) -> Logger {
        self.handle
            .log_context()
            .expect("Server has no log context")
            .logger(category)
    }
}
