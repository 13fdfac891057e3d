//! # Ember Process Management
//!
//! Lifecycle control for embedded ember servers.
//!
//! This crate provides:
//! - [`Configuration`] with YAML, option-map and builder loading
//! - [`ManagedProcess`] capability traits and the [`EmbeddedServer`]
//! - [`ProcessLifecycleController`] to create, start (with readiness
//!   polling) and stop [`ProcessHandle`]s
//!
//! ```rust,no_run
//! use ember_process_management::{readiness, Configuration, ProcessLifecycleController};
//! use std::time::Duration;
//!
//! # async fn run() -> ember_common::ProcessResult<()> {
//! let controller = ProcessLifecycleController::new();
//! let config = Configuration::builder().log_directory("/var/log/ember").build()?;
//! let mut handle = controller.create(config)?;
//!
//! controller
//!     .start(&mut handle, readiness::server_log_exists(), Duration::from_secs(30))
//!     .await?;
//! let client = handle.management_client()?;
//! # let _ = client;
//! controller.stop(&mut handle).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod handle;
pub mod process;
pub mod readiness;
pub mod server;

pub use config::{Configuration, ConfigurationBuilder, LoggerHint};
pub use controller::{
    ControllerOptions, ProcessLifecycleController, StopOutcome, DEFAULT_POLL_INTERVAL,
    MIN_POLL_INTERVAL,
};
pub use handle::ProcessHandle;
pub use process::{ManagedProcess, Startable, Stoppable};
pub use server::{EmbeddedServer, SERVER_CATEGORY};
