//! Resources: attribute maps stored at an address.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute values are plain JSON values.
pub type Value = serde_json::Value;

/// Attribute map for one node of the tree.
///
/// Attributes are kept in a `BTreeMap` so two resources with the same
/// content compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    attributes: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: BTreeMap<String, Value>) -> Self {
        Self { attributes }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// The list stored under `name`, if that attribute is a list.
    pub fn list(&self, name: &str) -> Option<&Vec<Value>> {
        self.attributes.get(name).and_then(Value::as_array)
    }

    pub fn list_contains(&self, name: &str, value: &Value) -> bool {
        self.list(name).is_some_and(|list| list.contains(value))
    }

    /// Name of the first list attribute that mentions `name` as a string.
    pub fn list_referencing(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find_map(|(attribute, value)| {
            value
                .as_array()
                .filter(|list| list.iter().any(|v| v.as_str() == Some(name)))
                .map(|_| attribute.as_str())
        })
    }

    /// Whole resource as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Insert at `index`, or append when `None`. An index past the end
    /// appends.
    pub(crate) fn insert_into_list(&mut self, name: &str, index: Option<usize>, value: Value) {
        let slot = self
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = slot {
            let index = index.map_or(list.len(), |i| i.min(list.len()));
            list.insert(index, value);
        }
    }

    pub(crate) fn remove_from_list(&mut self, name: &str, value: &Value) {
        if let Some(Value::Array(list)) = self.attributes.get_mut(name) {
            if let Some(position) = list.iter().position(|v| v == value) {
                list.remove(position);
            }
        }
    }
}
