//! ProcessLifecycleController - create, start and stop managed processes.

use crate::config::{validate_configuration, Configuration};
use crate::handle::ProcessHandle;
use crate::process::ManagedProcess;
use crate::server::EmbeddedServer;
use ember_common::{ProcessError, ProcessId, ProcessKind, ProcessResult, StopError};
use ember_logging::{ConsoleSink, StdConsole};
use ember_process_state::ProcessState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Controller-wide settings.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// How often `start` re-evaluates the readiness check.
    pub poll_interval: Duration,
    /// Console the servers' console handlers write to.
    pub console: Arc<dyn ConsoleSink>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            console: Arc::new(StdConsole),
        }
    }
}

/// Result of [`ProcessLifecycleController::stop`]. Every variant leaves the
/// handle in a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The handle was already `Stopped` or `Failed`; nothing was done.
    AlreadyStopped,
    /// Stopped, but termination reported problems.
    StoppedWithErrors(Vec<StopError>),
}

impl StopOutcome {
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopOutcome::StoppedWithErrors(_))
    }

    pub fn errors(&self) -> &[StopError] {
        match self {
            StopOutcome::StoppedWithErrors(errors) => errors,
            _ => &[],
        }
    }
}

/// Creates process handles and drives them through their lifecycle.
#[derive(Debug)]
pub struct ProcessLifecycleController {
    options: ControllerOptions,
    next_id: AtomicU64,
}

impl Default for ProcessLifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLifecycleController {
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(mut options: ControllerOptions) -> Self {
        options.poll_interval = options.poll_interval.max(MIN_POLL_INTERVAL);
        Self {
            options,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.options.poll_interval
    }

    /// Handle for a standalone embedded server.
    pub fn create(&self, config: Configuration) -> ProcessResult<ProcessHandle> {
        self.create_embedded(ProcessKind::Standalone, config)
    }

    /// Handle for a host controller, whose logging subsystem lives under
    /// `profile=default`.
    pub fn create_host_controller(&self, config: Configuration) -> ProcessResult<ProcessHandle> {
        self.create_embedded(ProcessKind::HostController, config)
    }

    /// Handle around an arbitrary process implementation.
    pub fn create_with(
        &self,
        kind: ProcessKind,
        config: Configuration,
        process: Box<dyn ManagedProcess>,
    ) -> ProcessResult<ProcessHandle> {
        validate_configuration(&config)?;
        let id = self.allocate_id(kind);
        debug!(process_id = %id, kind = %kind, "Process handle created");
        Ok(ProcessHandle::new(id, kind, config, process))
    }

    fn create_embedded(
        &self,
        kind: ProcessKind,
        config: Configuration,
    ) -> ProcessResult<ProcessHandle> {
        validate_configuration(&config)?;
        let id = self.allocate_id(kind);
        let server = EmbeddedServer::new(
            id.clone(),
            kind,
            config.clone(),
            Arc::clone(&self.options.console),
        );
        debug!(process_id = %id, kind = %kind, "Process handle created");
        Ok(ProcessHandle::new(id, kind, config, Box::new(server)))
    }

    fn allocate_id(&self, kind: ProcessKind) -> ProcessId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        ProcessId::new(format!("{}-{}", kind, n))
    }

    /// Launch the process and wait until `readiness` holds and the process
    /// reports itself booted, so the bound client sees a complete tree.
    ///
    /// On timeout the handle stays `Starting` and the process keeps running;
    /// call [`stop`](Self::stop) to reclaim it. A boot failure observed while
    /// waiting moves the handle to `Failed`.
    pub async fn start<F>(
        &self,
        handle: &mut ProcessHandle,
        readiness: F,
        timeout: Duration,
    ) -> ProcessResult<()>
    where
        F: Fn(&ProcessHandle) -> bool,
    {
        if !handle.state_machine.can_start() {
            return Err(ProcessError::invalid_state(
                handle.id.as_str(),
                "start",
                handle.state().to_string(),
            ));
        }

        handle.state_machine.transition_to_starting()?;
        info!(process_id = %handle.id, timeout = ?timeout, "Starting process");

        if let Err(e) = handle.process.launch().await {
            return Err(self.fail_start(handle, e.to_string()).await);
        }

        // None: the timeout is too large to represent, wait without a deadline
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(reason) = handle.process.boot_failure() {
                return Err(self.fail_start(handle, reason).await);
            }
            if readiness(&*handle) && handle.process.is_booted() {
                break;
            }
            let mut pause = self.options.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    warn!(
                        process_id = %handle.id,
                        timeout = ?timeout,
                        "Process not ready before timeout, left in starting state"
                    );
                    return Err(ProcessError::startup_timeout(handle.id.as_str(), timeout));
                }
                pause = pause.min(deadline - now);
            }
            sleep(pause).await;
        }

        let client = match handle.process.management_client() {
            Ok(client) => client,
            Err(e) => return Err(self.fail_start(handle, e.to_string()).await),
        };
        handle.state_machine.transition_to_running()?;
        handle.client = Some(client);
        info!(process_id = %handle.id, "Process running");
        Ok(())
    }

    /// Tear down a process that failed to start and mark the handle `Failed`.
    async fn fail_start(&self, handle: &mut ProcessHandle, reason: String) -> ProcessError {
        warn!(process_id = %handle.id, reason = %reason, "Process failed to start");
        for e in handle.process.terminate().await {
            warn!(process_id = %handle.id, error = %e, "Cleanup after failed start");
        }
        if let Err(e) = handle.state_machine.transition_to_failed(reason.clone()) {
            warn!(process_id = %handle.id, error = %e, "Could not mark process failed");
        }
        ProcessError::start_failed(handle.id.as_str(), reason)
    }

    /// Stop the process. Idempotent and best effort: termination problems are
    /// reported in the outcome, and the handle always ends `Stopped` (or stays
    /// `Failed`).
    pub async fn stop(&self, handle: &mut ProcessHandle) -> StopOutcome {
        match handle.state() {
            ProcessState::Stopped | ProcessState::Failed => {
                debug!(process_id = %handle.id, state = %handle.state(), "Process already stopped");
                return StopOutcome::AlreadyStopped;
            }
            ProcessState::Created => {
                if let Err(e) = handle.state_machine.transition_to_stopped() {
                    warn!(process_id = %handle.id, error = %e, "Unexpected state transition failure");
                }
                info!(process_id = %handle.id, "Process stopped before it was started");
                return StopOutcome::Stopped;
            }
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping => {}
        }

        info!(process_id = %handle.id, state = %handle.state(), "Stopping process");
        if handle.state() != ProcessState::Stopping {
            if let Err(e) = handle.state_machine.transition_to_stopping() {
                warn!(process_id = %handle.id, error = %e, "Unexpected state transition failure");
            }
        }

        if let Some(client) = handle.client.take() {
            client.close();
        }

        let errors = handle.process.terminate().await;
        for e in &errors {
            warn!(process_id = %handle.id, error = %e, "Error while stopping process");
        }

        if let Err(e) = handle.state_machine.transition_to_stopped() {
            warn!(process_id = %handle.id, error = %e, "Unexpected state transition failure");
        }
        info!(process_id = %handle.id, errors = errors.len(), "Process stopped");

        if errors.is_empty() {
            StopOutcome::Stopped
        } else {
            StopOutcome::StoppedWithErrors(errors)
        }
    }
}
