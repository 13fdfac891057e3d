//! The in-process embedded server.

use crate::config::Configuration;
use crate::process::{ManagedProcess, Startable, Stoppable};
use async_trait::async_trait;
use ember_common::{ProcessError, ProcessId, ProcessKind, ProcessResult, StopError};
use ember_logging::{ConsoleSink, LogContext, LoggingAddresses, LoggingSubsystem};
use ember_management::{ManagementClient, ManagementTree};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Category of the server's own log records.
pub const SERVER_CATEGORY: &str = "org.ember.server";

/// Where the boot task is. Once `Installing`, the blocking install runs to
/// completion and cannot be aborted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BootPhase {
    #[default]
    Waiting,
    Installing,
    Cancelled,
}

#[derive(Debug, Default)]
struct BootStatus {
    phase: Mutex<BootPhase>,
    booted: AtomicBool,
    failure: Mutex<Option<String>>,
}

/// An embedded server: a management tree plus a logging facility, booted on
/// a tokio task.
#[derive(Debug)]
pub struct EmbeddedServer {
    id: ProcessId,
    kind: ProcessKind,
    config: Configuration,
    console: Arc<dyn ConsoleSink>,
    tree: Arc<ManagementTree>,
    context: Arc<LogContext>,
    status: Arc<BootStatus>,
    boot_delay: Duration,
    boot_task: Option<JoinHandle<()>>,
}

impl EmbeddedServer {
    pub fn new(
        id: ProcessId,
        kind: ProcessKind,
        config: Configuration,
        console: Arc<dyn ConsoleSink>,
    ) -> Self {
        Self {
            id,
            kind,
            config,
            console,
            tree: Arc::new(ManagementTree::new()),
            context: Arc::new(LogContext::default()),
            status: Arc::new(BootStatus::default()),
            boot_delay: Duration::ZERO,
            boot_task: None,
        }
    }

    /// Wait before booting. Lets callers exercise readiness timeouts.
    pub fn with_boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn tree(&self) -> &Arc<ManagementTree> {
        &self.tree
    }
}

/// Everything the boot task needs, detached from `&self`.
struct Boot {
    id: ProcessId,
    kind: ProcessKind,
    config: Configuration,
    console: Arc<dyn ConsoleSink>,
    tree: Arc<ManagementTree>,
    context: Arc<LogContext>,
}

impl Boot {
    fn run(self) -> ProcessResult<()> {
        let started = Instant::now();
        let dir = &self.config.log_directory;
        std::fs::create_dir_all(dir).map_err(|e| {
            ProcessError::start_failed(
                self.id.as_str(),
                format!("Failed to create log directory {}: {}", dir.display(), e),
            )
        })?;

        let addresses = LoggingAddresses::for_kind(self.kind)
            .map_err(|e| ProcessError::start_failed(self.id.as_str(), e.to_string()))?;
        let subsystem = Arc::new(LoggingSubsystem::new(
            Arc::clone(&self.context),
            dir.clone(),
            self.console,
            addresses,
        ));
        subsystem
            .install(&self.tree, &self.config.bootstrap_logging())
            .map_err(|e| {
                ProcessError::start_failed(
                    self.id.as_str(),
                    format!("Failed to install logging subsystem: {}", e),
                )
            })?;

        let logger = self.context.logger(SERVER_CATEGORY);
        logger.info(format!(
            "Ember {} ({}) starting, logger hint {}",
            env!("CARGO_PKG_VERSION"),
            self.kind,
            self.config.logger_hint
        ));
        logger.info(format!(
            "Management tree ready with {} resources",
            self.tree.len()
        ));
        logger.info(format!(
            "Ember {} ({}) started in {}ms",
            env!("CARGO_PKG_VERSION"),
            self.kind,
            started.elapsed().as_millis()
        ));
        Ok(())
    }
}

#[async_trait]
impl Startable for EmbeddedServer {
    async fn launch(&mut self) -> ProcessResult<()> {
        if self.boot_task.is_some() {
            return Err(ProcessError::invalid_state(
                self.id.as_str(),
                "launch",
                "already launched",
            ));
        }

        let boot = Boot {
            id: self.id.clone(),
            kind: self.kind,
            config: self.config.clone(),
            console: Arc::clone(&self.console),
            tree: Arc::clone(&self.tree),
            context: Arc::clone(&self.context),
        };
        let status = Arc::clone(&self.status);
        let delay = self.boot_delay;
        let id = self.id.clone();

        info!(process_id = %id, kind = %self.kind, "Launching embedded server");
        self.boot_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            {
                let mut phase = status.phase.lock();
                if *phase == BootPhase::Cancelled {
                    return;
                }
                *phase = BootPhase::Installing;
            }
            // directory creation and log file opens block
            let outcome = match tokio::task::spawn_blocking(move || boot.run()).await {
                Ok(result) => result,
                Err(e) => Err(ProcessError::start_failed(
                    id.as_str(),
                    format!("Boot task failed: {}", e),
                )),
            };
            match outcome {
                Ok(()) => {
                    status.booted.store(true, Ordering::SeqCst);
                    info!(process_id = %id, "Embedded server booted");
                }
                Err(e) => {
                    warn!(process_id = %id, error = %e, "Embedded server failed to boot");
                    *status.failure.lock() = Some(e.to_string());
                }
            }
        }));
        Ok(())
    }
}

#[async_trait]
impl Stoppable for EmbeddedServer {
    async fn terminate(&mut self) -> Vec<StopError> {
        let mut errors = Vec::new();

        if let Some(task) = self.boot_task.take() {
            {
                let mut phase = self.status.phase.lock();
                if *phase == BootPhase::Waiting {
                    debug!(process_id = %self.id, "Cancelling pending boot");
                    *phase = BootPhase::Cancelled;
                    task.abort();
                }
            }
            // an install already under way finishes first, so close_all below
            // sees every handler it opened
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    errors.push(StopError::new(
                        self.id.as_str(),
                        format!("Boot task failed: {}", e),
                    ));
                }
            }
        }

        if self.status.booted.swap(false, Ordering::SeqCst) {
            self.context
                .logger(SERVER_CATEGORY)
                .info(format!("Ember ({}) stopped", self.kind));
        }

        errors.extend(
            self.context
                .close_all()
                .into_iter()
                .map(|e| StopError::new(self.id.as_str(), e.to_string())),
        );

        info!(process_id = %self.id, errors = errors.len(), "Embedded server terminated");
        errors
    }
}

impl ManagedProcess for EmbeddedServer {
    fn is_booted(&self) -> bool {
        self.status.booted.load(Ordering::SeqCst)
    }

    fn boot_failure(&self) -> Option<String> {
        self.status.failure.lock().clone()
    }

    fn management_client(&self) -> ProcessResult<ManagementClient> {
        Ok(ManagementClient::new(Arc::clone(&self.tree)))
    }

    fn log_context(&self) -> Option<Arc<LogContext>> {
        Some(Arc::clone(&self.context))
    }

    fn server_log_path(&self) -> PathBuf {
        self.config.server_log_path()
    }
}
