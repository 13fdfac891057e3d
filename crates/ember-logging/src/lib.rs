//! # Ember Logging
//!
//! The logging facility of an embedded server and the pieces that manage it:
//!
//! - [`LogContext`] holds named handlers and the root logger.
//! - [`LoggingSubsystem`] mirrors the `subsystem=logging` part of the
//!   management tree onto the context.
//! - [`LoggingConfigurator`] installs and removes file handlers as two-step
//!   composites with compensation.
//!
//! ```rust,no_run
//! use ember_logging::{HandlerConfig, LoggingAddresses, LoggingConfigurator};
//! use ember_management::{ManagementClient, ManagementTree};
//! use ember_common::ProcessKind;
//! use std::sync::Arc;
//!
//! let client = ManagementClient::new(Arc::new(ManagementTree::new()));
//! let addresses = LoggingAddresses::for_kind(ProcessKind::Standalone).unwrap();
//! let config = HandlerConfig::new("FILE-TEST", "INFO", "[test] %s%n", "/var/log/ember/test.log");
//!
//! let configurator = LoggingConfigurator::new(&client);
//! configurator
//!     .configure_file_handler(
//!         addresses.root_logger(),
//!         &addresses.file_handler(&config.name).unwrap(),
//!         &config,
//!     )
//!     .unwrap();
//! ```

pub mod configurator;
pub mod console;
pub mod context;
pub mod formatter;
pub mod handler;
pub mod subsystem;
pub mod types;

pub use configurator::{
    CompositeReport, CompositeState, CompositeStep, HandlerConfig, LoggingConfigurator,
};
pub use console::{CapturedConsole, ConsoleSink, ConsoleStream, StdConsole};
pub use context::{LogContext, Logger};
pub use formatter::{
    Formatter, FormatterSpec, JsonFormatter, PatternFormatter, COMPACT_PATTERN, DEFAULT_PATTERN,
};
pub use handler::{ConsoleHandler, FileHandler, Handler};
pub use subsystem::{BootstrapLogging, LoggingAddresses, LoggingSubsystem, SERVER_LOG};
pub use types::{LogLevel, LogRecord};
