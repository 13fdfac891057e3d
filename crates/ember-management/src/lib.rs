//! # Ember Management
//!
//! The management tree of an embedded process and the client used to reach
//! it.
//!
//! ```text
//! caller ──Operation──► ManagementClient ──► ManagementTree ──► RuntimeStage
//!        ◄──OperationResult──────────────────┘   (model)         (live process)
//! ```
//!
//! Each [`Operation`] is atomic. Multi-operation changes are the business of
//! higher layers, which must order and compensate them themselves.

pub mod address;
pub mod client;
pub mod operation;
pub mod resource;
pub mod tree;

pub use address::{PathElement, ResourceAddress};
pub use client::{Executable, ExecutableExt, ManagementClient};
pub use operation::{Operation, OperationEnvelope, OperationResult, Outcome};
pub use resource::{Resource, Value};
pub use tree::{ManagementTree, RuntimeStage};
