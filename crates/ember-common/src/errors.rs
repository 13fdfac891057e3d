//! Error types shared by the ember crates.
//!
//! One family per layer:
//!
//! - [`ProcessError`]: lifecycle misuse, configuration, startup failures.
//! - [`LoggingError`]: handler I/O and log context bookkeeping.
//! - [`ManagementError`]: single operations against the management tree.
//! - [`CompositeError`]: multi-step logging reconfiguration, which carries the
//!   original failure together with the outcome of the compensating steps.
//!
//! [`StopError`] is deliberately not part of any `Result`: stopping is best
//! effort, so termination problems are reported as data alongside a handle
//! that still reaches `Stopped`.
//!
//! ```rust
//! use ember_common::{ManagementError, ManagementResult};
//!
//! fn lookup() -> ManagementResult<()> {
//!     Err(ManagementError::not_found("resource subsystem=logging"))
//! }
//!
//! assert!(matches!(lookup(), Err(ManagementError::NotFound { .. })));
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for lifecycle operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Result type for single management operations.
pub type ManagementResult<T> = std::result::Result<T, ManagementError>;

/// Result type for the in-process logging facility.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;

/// Result type for composite (multi-operation) reconfiguration.
pub type CompositeResult<T> = std::result::Result<T, CompositeError>;

// ==============================================================================
// Process Lifecycle Errors
// ==============================================================================

/// Lifecycle errors raised by the process controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Process state error: {id} - cannot {operation} while {actual}")]
    InvalidState {
        id: String,
        operation: String,
        actual: String,
    },

    #[error("Process startup timeout: {id} - not ready after {timeout:?}")]
    StartupTimeout { id: String, timeout: Duration },

    #[error("Process start failed: {id} - {reason}")]
    StartFailed { id: String, reason: String },
}

impl ProcessError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        operation: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            operation: operation.into(),
            actual: actual.into(),
        }
    }

    pub fn startup_timeout(id: impl Into<String>, timeout: Duration) -> Self {
        Self::StartupTimeout {
            id: id.into(),
            timeout,
        }
    }

    pub fn start_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// A non-fatal problem encountered while terminating a process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Process stop error: {id} - {reason}")]
pub struct StopError {
    pub id: String,
    pub reason: String,
}

impl StopError {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// ==============================================================================
// Logging Facility Errors
// ==============================================================================

/// Errors raised by log handlers and the log context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    #[error("Invalid formatter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Log handler I/O error: {handler} ({path}) - {reason}")]
    Io {
        handler: String,
        path: String,
        reason: String,
    },

    #[error("Unknown log handler: {0}")]
    UnknownHandler(String),

    #[error("Log handler already registered: {0}")]
    DuplicateHandler(String),

    #[error("Log handler already attached: {0}")]
    AlreadyAttached(String),

    #[error("Log handler still attached: {0}")]
    StillAttached(String),

    #[error("Log handler closed: {0}")]
    Closed(String),

    #[error("Invalid configuration for log handler {handler}: {reason}")]
    InvalidHandlerConfig { handler: String, reason: String },
}

impl LoggingError {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_handler_config(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHandlerConfig {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    pub fn io(
        handler: impl Into<String>,
        path: impl fmt::Display,
        error: &std::io::Error,
    ) -> Self {
        Self::Io {
            handler: handler.into(),
            path: path.to_string(),
            reason: error.to_string(),
        }
    }
}

// ==============================================================================
// Management Tree Errors
// ==============================================================================

/// Failure of a single management operation. The tree is unchanged whenever
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagementError {
    #[error("Duplicate resource: {address}")]
    DuplicateResource { address: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Duplicate value: '{value}' already present in {address} attribute '{attribute}'")]
    DuplicateValue {
        address: String,
        attribute: String,
        value: String,
    },

    #[error("Resource in use: {address} - {reason}")]
    ResourceInUse { address: String, reason: String },

    #[error("Missing parent resource for {address}")]
    MissingParent { address: String },

    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },

    #[error("Runtime rejected '{operation}' on {address}: {reason}")]
    RuntimeFailure {
        operation: String,
        address: String,
        reason: String,
    },

    #[error("Management client is closed")]
    ClientClosed,
}

impl ManagementError {
    pub fn duplicate_resource(address: impl fmt::Display) -> Self {
        Self::DuplicateResource {
            address: address.to_string(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn duplicate_value(
        address: impl fmt::Display,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::DuplicateValue {
            address: address.to_string(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn resource_in_use(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::ResourceInUse {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_parent(address: impl fmt::Display) -> Self {
        Self::MissingParent {
            address: address.to_string(),
        }
    }

    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn runtime_failure(
        operation: impl Into<String>,
        address: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::RuntimeFailure {
            operation: operation.into(),
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

// ==============================================================================
// Composite Operation Errors
// ==============================================================================

/// What happened to the already-applied steps of a failed composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The failing step was the first mutation; nothing needed undoing.
    NotRequired,
    /// Every compensation succeeded; the tree matches its pre-call state.
    RolledBack { compensations: usize },
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::NotRequired => write!(f, "no rollback required"),
            RollbackOutcome::RolledBack { compensations } => {
                write!(f, "rolled back {} step(s)", compensations)
            }
        }
    }
}

/// Failure of a composite operation.
///
/// `OperationFailed` means the tree is consistent again (either nothing was
/// applied or everything was compensated). `DoubleFault` means a compensation
/// failed too and the tree may hold a partial change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    #[error("{operation} failed at step {step}: {cause} ({rollback})")]
    OperationFailed {
        operation: String,
        step: usize,
        #[source]
        cause: ManagementError,
        rollback: RollbackOutcome,
    },

    #[error("{operation} double fault at step {step}: {cause}; compensation failed: {compensation}")]
    DoubleFault {
        operation: String,
        step: usize,
        #[source]
        cause: ManagementError,
        compensation: ManagementError,
    },
}

impl CompositeError {
    /// The failure that aborted the composite, never the compensation failure.
    pub fn cause(&self) -> &ManagementError {
        match self {
            CompositeError::OperationFailed { cause, .. } => cause,
            CompositeError::DoubleFault { cause, .. } => cause,
        }
    }

    /// 1-based index of the step that failed.
    pub fn step(&self) -> usize {
        match self {
            CompositeError::OperationFailed { step, .. } => *step,
            CompositeError::DoubleFault { step, .. } => *step,
        }
    }

    /// Whether the tree is known to be back in its pre-call state.
    pub fn is_consistent(&self) -> bool {
        matches!(self, CompositeError::OperationFailed { .. })
    }
}
