//! Multi-step logging reconfiguration with compensation.
//!
//! The tree only guarantees atomicity per operation. A composite here is an
//! ordered list of steps, each paired with the operation that undoes it. When
//! step `k` fails, the compensations of steps `k-1..1` run in reverse order.
//! If a compensation fails too the composite ends in a double fault and the
//! tree may hold a partial change.

use crate::formatter::FormatterSpec;
use crate::subsystem::{attributes, formatter_attributes};
use ember_common::{CompositeError, CompositeResult, RollbackOutcome};
use ember_management::{Executable, ExecutableExt, Operation, ResourceAddress, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub const CONFIGURE_FILE_HANDLER: &str = "configure-file-handler";
pub const REMOVE_FILE_HANDLER: &str = "remove-file-handler";

/// A file handler to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerConfig {
    pub name: String,
    pub level: String,
    pub formatter_pattern: String,
    pub file_path: PathBuf,
}

impl HandlerConfig {
    pub fn new(
        name: impl Into<String>,
        level: impl Into<String>,
        formatter_pattern: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            level: level.into(),
            formatter_pattern: formatter_pattern.into(),
            file_path: file_path.into(),
        }
    }

    pub fn to_attributes(&self) -> BTreeMap<String, Value> {
        let mut attrs =
            formatter_attributes(&FormatterSpec::Pattern(self.formatter_pattern.clone()));
        attrs.insert(attributes::LEVEL.to_string(), json!(self.level));
        attrs.insert(
            attributes::FILE.to_string(),
            json!({ attributes::PATH: self.file_path.to_string_lossy() }),
        );
        attrs
    }
}

/// Where a composite currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    Pending,
    Applying { step: usize },
    /// Step failed; nothing before it needed undoing.
    Aborted { step: usize },
    StepFailed { step: usize },
    Compensating,
    RolledBack,
    Committed,
    DoubleFault,
}

impl CompositeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompositeState::Aborted { .. }
                | CompositeState::RolledBack
                | CompositeState::Committed
                | CompositeState::DoubleFault
        )
    }
}

impl fmt::Display for CompositeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeState::Pending => write!(f, "pending"),
            CompositeState::Applying { step } => write!(f, "applying step {}", step),
            CompositeState::Aborted { step } => write!(f, "aborted at step {}", step),
            CompositeState::StepFailed { step } => write!(f, "step {} failed", step),
            CompositeState::Compensating => write!(f, "compensating"),
            CompositeState::RolledBack => write!(f, "rolled back"),
            CompositeState::Committed => write!(f, "committed"),
            CompositeState::DoubleFault => write!(f, "double fault"),
        }
    }
}

/// One forward operation and the operation that reverses it.
#[derive(Debug, Clone)]
pub struct CompositeStep {
    pub operation: Operation,
    pub compensation: Option<Operation>,
}

impl CompositeStep {
    pub fn new(operation: Operation, compensation: Operation) -> Self {
        Self {
            operation,
            compensation: Some(compensation),
        }
    }

    pub fn irreversible(operation: Operation) -> Self {
        Self {
            operation,
            compensation: None,
        }
    }
}

/// Summary of a committed composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeReport {
    pub operation: String,
    pub steps: usize,
    pub transitions: Vec<CompositeState>,
}

struct Saga<'a, E: Executable + ?Sized> {
    executor: &'a E,
    name: &'static str,
    state: CompositeState,
    transitions: Vec<CompositeState>,
}

impl<'a, E: Executable + ?Sized> Saga<'a, E> {
    fn new(executor: &'a E, name: &'static str) -> Self {
        Self {
            executor,
            name,
            state: CompositeState::Pending,
            transitions: vec![CompositeState::Pending],
        }
    }

    fn transition(&mut self, next: CompositeState) {
        debug!(composite = self.name, from = %self.state, to = %next, "Composite transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn run(&mut self, steps: Vec<CompositeStep>) -> CompositeResult<usize> {
        let mut compensations: Vec<Operation> = Vec::new();
        let total = steps.len();

        for (index, step) in steps.into_iter().enumerate() {
            let number = index + 1;
            self.transition(CompositeState::Applying { step: number });

            let cause = match self.executor.execute(&step.operation).into_result() {
                Ok(_) => {
                    compensations.extend(step.compensation);
                    continue;
                }
                Err(cause) => cause,
            };

            warn!(
                composite = self.name,
                step = number,
                operation = %step.operation,
                error = %cause,
                "Composite step failed"
            );

            if compensations.is_empty() {
                self.transition(CompositeState::Aborted { step: number });
                return Err(CompositeError::OperationFailed {
                    operation: self.name.to_string(),
                    step: number,
                    cause,
                    rollback: RollbackOutcome::NotRequired,
                });
            }

            self.transition(CompositeState::StepFailed { step: number });
            self.transition(CompositeState::Compensating);
            let count = compensations.len();
            while let Some(compensation) = compensations.pop() {
                if let Err(compensation_error) =
                    self.executor.execute(&compensation).into_result()
                {
                    self.transition(CompositeState::DoubleFault);
                    error!(
                        composite = self.name,
                        step = number,
                        compensation = %compensation,
                        error = %compensation_error,
                        "Compensation failed, model may hold a partial change"
                    );
                    return Err(CompositeError::DoubleFault {
                        operation: self.name.to_string(),
                        step: number,
                        cause,
                        compensation: compensation_error,
                    });
                }
            }
            self.transition(CompositeState::RolledBack);
            return Err(CompositeError::OperationFailed {
                operation: self.name.to_string(),
                step: number,
                cause,
                rollback: RollbackOutcome::RolledBack {
                    compensations: count,
                },
            });
        }

        self.transition(CompositeState::Committed);
        Ok(total)
    }
}

/// Installs and removes file handlers on a running process through a
/// management [`Executable`].
///
/// Composite calls on one configurator should not be interleaved with other
/// mutations of the same subtree; the compensations assume they undo the
/// configurator's own steps.
pub struct LoggingConfigurator<E: Executable> {
    executor: E,
    last_transitions: Mutex<Vec<CompositeState>>,
}

impl<E: Executable> fmt::Debug for LoggingConfigurator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfigurator")
            .field("last_transitions", &*self.last_transitions.lock())
            .finish()
    }
}

impl<E: Executable> LoggingConfigurator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            last_transitions: Mutex::new(Vec::new()),
        }
    }

    /// States visited by the most recent composite, success or not.
    pub fn last_transitions(&self) -> Vec<CompositeState> {
        self.last_transitions.lock().clone()
    }

    /// Add `handler_address` from `config`, then attach it to the root logger.
    pub fn configure_file_handler(
        &self,
        root_logger_address: &ResourceAddress,
        handler_address: &ResourceAddress,
        config: &HandlerConfig,
    ) -> CompositeResult<CompositeReport> {
        info!(
            handler = %handler_address,
            path = %config.file_path.display(),
            "Configuring file handler"
        );
        let steps = vec![
            CompositeStep::new(
                Operation::add_resource(handler_address.clone(), config.to_attributes()),
                Operation::remove_resource(handler_address.clone()),
            ),
            CompositeStep::new(
                Operation::list_append(
                    root_logger_address.clone(),
                    attributes::HANDLERS,
                    config.name.as_str(),
                ),
                Operation::list_remove(
                    root_logger_address.clone(),
                    attributes::HANDLERS,
                    config.name.as_str(),
                ),
            ),
        ];
        self.run(CONFIGURE_FILE_HANDLER, steps)
    }

    /// Detach `handler_name` from the root logger, then remove the handler.
    /// A failed detach stops before the removal is attempted.
    ///
    /// The handler's position in the root logger's list is read first, so a
    /// rollback re-attaches it where it was and dispatch order is preserved.
    pub fn remove_file_handler(
        &self,
        root_logger_address: &ResourceAddress,
        handler_address: &ResourceAddress,
        handler_name: &str,
    ) -> CompositeResult<CompositeReport> {
        info!(handler = %handler_address, "Removing file handler");
        let position = self
            .executor
            .read_attribute(root_logger_address, attributes::HANDLERS)
            .ok()
            .and_then(|handlers| {
                handlers
                    .as_array()?
                    .iter()
                    .position(|name| name.as_str() == Some(handler_name))
            });
        // without a position the detach itself fails, so this is never run
        let reattach = match position {
            Some(index) => Operation::list_insert(
                root_logger_address.clone(),
                attributes::HANDLERS,
                index,
                handler_name,
            ),
            None => Operation::list_append(
                root_logger_address.clone(),
                attributes::HANDLERS,
                handler_name,
            ),
        };
        let steps = vec![
            CompositeStep::new(
                Operation::list_remove(
                    root_logger_address.clone(),
                    attributes::HANDLERS,
                    handler_name,
                ),
                reattach,
            ),
            CompositeStep::irreversible(Operation::remove_resource(handler_address.clone())),
        ];
        self.run(REMOVE_FILE_HANDLER, steps)
    }

    /// Run arbitrary steps with the same compensation rules.
    pub fn run(
        &self,
        name: &'static str,
        steps: Vec<CompositeStep>,
    ) -> CompositeResult<CompositeReport> {
        let mut saga = Saga::new(&self.executor, name);
        let result = saga.run(steps);
        *self.last_transitions.lock() = saga.transitions.clone();
        result.map(|steps| CompositeReport {
            operation: name.to_string(),
            steps,
            transitions: saga.transitions,
        })
    }
}
