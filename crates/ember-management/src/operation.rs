//! Operations against the tree and their results.
//!
//! Internally an operation is the closed [`Operation`] enum. At the client
//! boundary it travels as an [`OperationEnvelope`] (`name`, `address`,
//! `parameters`), which converts to and from the enum.

use crate::address::ResourceAddress;
use crate::resource::Value;
use ember_common::{ManagementError, ManagementResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operation names as they appear in an envelope.
pub mod names {
    pub const ADD: &str = "add";
    pub const REMOVE: &str = "remove";
    pub const LIST_ADD: &str = "list-add";
    pub const LIST_REMOVE: &str = "list-remove";
    pub const READ_RESOURCE: &str = "read-resource";
    pub const READ_ATTRIBUTE: &str = "read-attribute";
}

/// Envelope parameter carrying the attribute name of list and read operations.
pub const NAME_PARAMETER: &str = "name";
/// Envelope parameter carrying the list element of list operations.
pub const VALUE_PARAMETER: &str = "value";
/// Optional `list-add` parameter: position to insert at instead of appending.
pub const INDEX_PARAMETER: &str = "index";

/// A single request against the management tree. Each variant is atomic on
/// its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddResource {
        address: ResourceAddress,
        attributes: BTreeMap<String, Value>,
    },
    RemoveResource {
        address: ResourceAddress,
    },
    /// Append `value`, or insert it at `index` when one is given.
    ListAppend {
        address: ResourceAddress,
        attribute: String,
        value: Value,
        index: Option<usize>,
    },
    ListRemove {
        address: ResourceAddress,
        attribute: String,
        value: Value,
    },
    ReadResource {
        address: ResourceAddress,
    },
    ReadAttribute {
        address: ResourceAddress,
        attribute: String,
    },
}

impl Operation {
    pub fn add_resource(address: ResourceAddress, attributes: BTreeMap<String, Value>) -> Self {
        Self::AddResource {
            address,
            attributes,
        }
    }

    pub fn remove_resource(address: ResourceAddress) -> Self {
        Self::RemoveResource { address }
    }

    pub fn list_append(
        address: ResourceAddress,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::ListAppend {
            address,
            attribute: attribute.into(),
            value: value.into(),
            index: None,
        }
    }

    /// `list-add` at a fixed position; an index past the end is rejected.
    pub fn list_insert(
        address: ResourceAddress,
        attribute: impl Into<String>,
        index: usize,
        value: impl Into<Value>,
    ) -> Self {
        Self::ListAppend {
            address,
            attribute: attribute.into(),
            value: value.into(),
            index: Some(index),
        }
    }

    pub fn list_remove(
        address: ResourceAddress,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::ListRemove {
            address,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn read_resource(address: ResourceAddress) -> Self {
        Self::ReadResource { address }
    }

    pub fn read_attribute(address: ResourceAddress, attribute: impl Into<String>) -> Self {
        Self::ReadAttribute {
            address,
            attribute: attribute.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddResource { .. } => names::ADD,
            Operation::RemoveResource { .. } => names::REMOVE,
            Operation::ListAppend { .. } => names::LIST_ADD,
            Operation::ListRemove { .. } => names::LIST_REMOVE,
            Operation::ReadResource { .. } => names::READ_RESOURCE,
            Operation::ReadAttribute { .. } => names::READ_ATTRIBUTE,
        }
    }

    pub fn address(&self) -> &ResourceAddress {
        match self {
            Operation::AddResource { address, .. }
            | Operation::RemoveResource { address }
            | Operation::ListAppend { address, .. }
            | Operation::ListRemove { address, .. }
            | Operation::ReadResource { address }
            | Operation::ReadAttribute { address, .. } => address,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address(), self.name())
    }
}

/// Wire form of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEnvelope {
    pub name: String,
    pub address: ResourceAddress,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl From<&Operation> for OperationEnvelope {
    fn from(operation: &Operation) -> Self {
        let mut parameters = BTreeMap::new();
        match operation {
            Operation::AddResource { attributes, .. } => parameters = attributes.clone(),
            Operation::ListAppend {
                attribute,
                value,
                index,
                ..
            } => {
                parameters.insert(NAME_PARAMETER.to_string(), Value::from(attribute.as_str()));
                parameters.insert(VALUE_PARAMETER.to_string(), value.clone());
                if let Some(index) = index {
                    parameters.insert(INDEX_PARAMETER.to_string(), Value::from(*index));
                }
            }
            Operation::ListRemove {
                attribute, value, ..
            } => {
                parameters.insert(NAME_PARAMETER.to_string(), Value::from(attribute.as_str()));
                parameters.insert(VALUE_PARAMETER.to_string(), value.clone());
            }
            Operation::ReadAttribute { attribute, .. } => {
                parameters.insert(NAME_PARAMETER.to_string(), Value::from(attribute.as_str()));
            }
            Operation::RemoveResource { .. } | Operation::ReadResource { .. } => {}
        }
        Self {
            name: operation.name().to_string(),
            address: operation.address().clone(),
            parameters,
        }
    }
}

impl TryFrom<OperationEnvelope> for Operation {
    type Error = ManagementError;

    fn try_from(envelope: OperationEnvelope) -> ManagementResult<Self> {
        let OperationEnvelope {
            name,
            address,
            mut parameters,
        } = envelope;

        let attribute_name = |parameters: &mut BTreeMap<String, Value>| -> ManagementResult<String> {
            match parameters.remove(NAME_PARAMETER) {
                Some(Value::String(attribute)) if !attribute.is_empty() => Ok(attribute),
                Some(_) => Err(ManagementError::invalid_operation(
                    &name,
                    "parameter 'name' must be a non-empty string",
                )),
                None => Err(ManagementError::invalid_operation(
                    &name,
                    "missing parameter 'name'",
                )),
            }
        };

        let operation = match name.as_str() {
            names::ADD => Operation::add_resource(address, parameters),
            names::REMOVE => Operation::remove_resource(address),
            names::READ_RESOURCE => Operation::read_resource(address),
            names::READ_ATTRIBUTE => {
                let attribute = attribute_name(&mut parameters)?;
                Operation::read_attribute(address, attribute)
            }
            names::LIST_ADD | names::LIST_REMOVE => {
                let attribute = attribute_name(&mut parameters)?;
                let value = parameters.remove(VALUE_PARAMETER).ok_or_else(|| {
                    ManagementError::invalid_operation(&name, "missing parameter 'value'")
                })?;
                if name == names::LIST_ADD {
                    match parameters.remove(INDEX_PARAMETER) {
                        None => Operation::list_append(address, attribute, value),
                        Some(index) => {
                            let index = index
                                .as_u64()
                                .and_then(|i| usize::try_from(i).ok())
                                .ok_or_else(|| {
                                    ManagementError::invalid_operation(
                                        &name,
                                        "parameter 'index' must be a non-negative integer",
                                    )
                                })?;
                            Operation::list_insert(address, attribute, index, value)
                        }
                    }
                } else {
                    Operation::list_remove(address, attribute, value)
                }
            }
            other => {
                return Err(ManagementError::invalid_operation(
                    other,
                    "unknown operation",
                ))
            }
        };
        Ok(operation)
    }
}

/// Outcome flag of an [`OperationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Result of executing one operation.
///
/// The typed failure is kept alongside its description so callers inside the
/// process can match on it, while the serialized form only carries text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_description: Option<String>,
    #[serde(skip)]
    failure: Option<ManagementError>,
}

impl OperationResult {
    pub fn success(result: Value) -> Self {
        Self {
            outcome: Outcome::Success,
            result,
            failure_description: None,
            failure: None,
        }
    }

    pub fn failed(error: ManagementError) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: Value::Null,
            failure_description: Some(error.to_string()),
            failure: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn failure(&self) -> Option<&ManagementError> {
        self.failure.as_ref()
    }

    pub fn into_result(self) -> ManagementResult<Value> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

impl From<ManagementResult<Value>> for OperationResult {
    fn from(result: ManagementResult<Value>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failed(error),
        }
    }
}
