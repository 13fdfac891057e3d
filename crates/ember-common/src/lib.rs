//! # Ember Common
//!
//! Types shared by every ember crate: the error taxonomy and a few
//! identifiers. Nothing here performs I/O.

pub mod errors;
pub mod types;

pub use errors::{
    CompositeError, CompositeResult, LoggingError, LoggingResult, ManagementError,
    ManagementResult, ProcessError, ProcessResult, RollbackOutcome, StopError,
};
pub use types::{ProcessId, ProcessKind};
