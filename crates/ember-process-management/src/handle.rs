//! ProcessHandle - caller-owned view of one managed process.

use crate::config::Configuration;
use crate::process::ManagedProcess;
use ember_common::{ProcessError, ProcessId, ProcessKind, ProcessResult};
use ember_logging::LogContext;
use ember_management::ManagementClient;
use ember_process_state::{ProcessState, ProcessStateMachine};
use std::path::PathBuf;
use std::sync::Arc;

/// Identity, lifecycle state, configuration and (while running) the bound
/// management client of one process.
///
/// Lifecycle calls take `&mut ProcessHandle`, so at most one of them can be
/// in flight per handle.
#[derive(Debug)]
pub struct ProcessHandle {
    pub(crate) id: ProcessId,
    pub(crate) kind: ProcessKind,
    pub(crate) config: Configuration,
    pub(crate) state_machine: ProcessStateMachine,
    pub(crate) process: Box<dyn ManagedProcess>,
    pub(crate) client: Option<ManagementClient>,
}

impl ProcessHandle {
    pub(crate) fn new(
        id: ProcessId,
        kind: ProcessKind,
        config: Configuration,
        process: Box<dyn ManagedProcess>,
    ) -> Self {
        Self {
            state_machine: ProcessStateMachine::new(id.as_str()),
            id,
            kind,
            config,
            process,
            client: None,
        }
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn state(&self) -> ProcessState {
        self.state_machine.current_state()
    }

    pub fn state_machine(&self) -> &ProcessStateMachine {
        &self.state_machine
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// The client bound when the process reached `Running`.
    pub fn management_client(&self) -> ProcessResult<&ManagementClient> {
        self.client.as_ref().ok_or_else(|| {
            ProcessError::invalid_state(
                self.id.as_str(),
                "obtain management client",
                self.state().to_string(),
            )
        })
    }

    pub fn log_context(&self) -> Option<Arc<LogContext>> {
        self.process.log_context()
    }

    pub fn server_log_path(&self) -> PathBuf {
        self.process.server_log_path()
    }

    pub fn is_booted(&self) -> bool {
        self.process.is_booted()
    }
}
