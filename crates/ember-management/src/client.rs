//! Management clients: the only way callers reach a running tree.

use crate::address::ResourceAddress;
use crate::operation::{Operation, OperationEnvelope, OperationResult};
use crate::resource::Value;
use crate::tree::ManagementTree;
use ember_common::{ManagementError, ManagementResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Something that can execute a single management operation synchronously.
///
/// Operations are applied in the order they are issued; there is no batching.
pub trait Executable: Send + Sync {
    fn execute(&self, operation: &Operation) -> OperationResult;
}

/// Typed helpers over [`Executable::execute`].
pub trait ExecutableExt: Executable {
    fn add_resource(
        &self,
        address: &ResourceAddress,
        attributes: BTreeMap<String, Value>,
    ) -> ManagementResult<()> {
        self.execute(&Operation::add_resource(address.clone(), attributes))
            .into_result()
            .map(|_| ())
    }

    fn remove_resource(&self, address: &ResourceAddress) -> ManagementResult<()> {
        self.execute(&Operation::remove_resource(address.clone()))
            .into_result()
            .map(|_| ())
    }

    fn append_to_list(
        &self,
        address: &ResourceAddress,
        attribute: &str,
        value: impl Into<Value>,
    ) -> ManagementResult<()> {
        self.execute(&Operation::list_append(address.clone(), attribute, value))
            .into_result()
            .map(|_| ())
    }

    fn remove_from_list(
        &self,
        address: &ResourceAddress,
        attribute: &str,
        value: impl Into<Value>,
    ) -> ManagementResult<()> {
        self.execute(&Operation::list_remove(address.clone(), attribute, value))
            .into_result()
            .map(|_| ())
    }

    fn read_resource(&self, address: &ResourceAddress) -> ManagementResult<Value> {
        self.execute(&Operation::read_resource(address.clone()))
            .into_result()
    }

    fn read_attribute(&self, address: &ResourceAddress, attribute: &str) -> ManagementResult<Value> {
        self.execute(&Operation::read_attribute(address.clone(), attribute))
            .into_result()
    }
}

impl<T: Executable + ?Sized> ExecutableExt for T {}

impl<T: Executable + ?Sized> Executable for &T {
    fn execute(&self, operation: &Operation) -> OperationResult {
        (**self).execute(operation)
    }
}

impl<T: Executable + ?Sized> Executable for Arc<T> {
    fn execute(&self, operation: &Operation) -> OperationResult {
        (**self).execute(operation)
    }
}

/// Client bound to one process's tree.
///
/// Once closed, every operation fails with [`ManagementError::ClientClosed`].
#[derive(Debug)]
pub struct ManagementClient {
    tree: Arc<ManagementTree>,
    closed: AtomicBool,
}

impl ManagementClient {
    pub fn new(tree: Arc<ManagementTree>) -> Self {
        Self {
            tree,
            closed: AtomicBool::new(false),
        }
    }

    /// Execute an operation received in wire form.
    pub fn execute_envelope(&self, envelope: OperationEnvelope) -> OperationResult {
        match Operation::try_from(envelope) {
            Ok(operation) => self.execute(&operation),
            Err(e) => OperationResult::failed(e),
        }
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Management client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Executable for ManagementClient {
    fn execute(&self, operation: &Operation) -> OperationResult {
        if self.is_closed() {
            return OperationResult::failed(ManagementError::ClientClosed);
        }
        self.tree.execute(operation)
    }
}
