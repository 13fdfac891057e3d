use chrono::{DateTime, Utc};
use ember_common::errors::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_HISTORY: usize = 100;

/// Lifecycle state of an embedded process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Handle exists, nothing launched yet
    Created,
    /// Launched, waiting for readiness
    Starting,
    /// Ready; a management client is bound
    Running,
    /// Termination in progress
    Stopping,
    /// Terminated; the handle can never run again
    Stopped,
    /// Launch or boot failed; the handle can never run again
    Failed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Created => write!(f, "created"),
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Failed => write!(f, "failed"),
        }
    }
}

impl ProcessState {
    /// Terminal states are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Stopping)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ProcessState,
    pub to_state: ProcessState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Enforces the monotonic lifecycle:
///
/// ```text
/// Created ──► Starting ──► Running ──► Stopping ──► Stopped
///    │           │  └────────────────────▲
///    │           └──► Failed
///    └──────────────────────────────────────────────► Stopped
/// ```
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    process_id: String,
    current_state: ProcessState,
    previous_state: Option<ProcessState>,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl ProcessStateMachine {
    pub fn new(process_id: &str) -> Self {
        Self {
            process_id: process_id.to_string(),
            current_state: ProcessState::Created,
            previous_state: None,
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<ProcessState> {
        self.previous_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    /// Check if a transition from the current state to `target_state` is valid
    pub fn is_valid_transition(&self, target_state: ProcessState) -> bool {
        matches!(
            (self.current_state, target_state),
            (ProcessState::Created, ProcessState::Starting)
                | (ProcessState::Created, ProcessState::Stopped)
                | (ProcessState::Starting, ProcessState::Running)
                | (ProcessState::Starting, ProcessState::Failed)
                | (ProcessState::Starting, ProcessState::Stopping)
                | (ProcessState::Running, ProcessState::Stopping)
                | (ProcessState::Stopping, ProcessState::Stopped)
        )
    }

    /// Transition to a new state with optional reason
    pub fn transition_to(
        &mut self,
        target_state: ProcessState,
        reason: Option<String>,
    ) -> ProcessResult<()> {
        if !self.is_valid_transition(target_state) {
            return Err(ProcessError::invalid_state(
                &self.process_id,
                format!("transition to {}", target_state),
                self.current_state.to_string(),
            ));
        }

        let now = Utc::now();
        let from_state = self.current_state;
        self.state_history.push(StateTransition {
            from_state,
            to_state: target_state,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        self.previous_state = Some(from_state);
        self.current_state = target_state;
        self.last_transition_time = now;

        tracing::debug!(
            "Process {} transitioned from {} to {}",
            self.process_id,
            from_state,
            target_state
        );

        Ok(())
    }

    pub fn transition_to_starting(&mut self) -> ProcessResult<()> {
        self.transition_to(ProcessState::Starting, Some("Process start requested".to_string()))
    }

    pub fn transition_to_running(&mut self) -> ProcessResult<()> {
        self.transition_to(ProcessState::Running, Some("Readiness check passed".to_string()))
    }

    pub fn transition_to_stopping(&mut self) -> ProcessResult<()> {
        self.transition_to(ProcessState::Stopping, Some("Process stop requested".to_string()))
    }

    pub fn transition_to_stopped(&mut self) -> ProcessResult<()> {
        self.transition_to(ProcessState::Stopped, Some("Process stopped".to_string()))
    }

    pub fn transition_to_failed(&mut self, reason: String) -> ProcessResult<()> {
        self.transition_to(ProcessState::Failed, Some(reason))
    }

    /// Only a freshly created handle may be started.
    pub fn can_start(&self) -> bool {
        self.current_state == ProcessState::Created
    }

    pub fn can_stop(&self) -> bool {
        !self.current_state.is_terminal()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn count_transitions_to(&self, state: ProcessState) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to_state == state)
            .count()
    }
}
