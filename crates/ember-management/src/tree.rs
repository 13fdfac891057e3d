//! In-memory management tree.
//!
//! Every mutating operation runs in three phases under one lock:
//!
//! 1. validate against the model (no mutation),
//! 2. hand the operation to the [`RuntimeStage`] owning that part of the tree,
//! 3. commit to the model.
//!
//! Phase 3 cannot fail once 1 and 2 succeeded, so an operation either lands
//! completely or leaves model and runtime untouched.

use crate::address::ResourceAddress;
use crate::operation::{Operation, OperationResult};
use crate::resource::{Resource, Value};
use ember_common::{ManagementError, ManagementResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Applies validated model changes to the live process.
///
/// A stage may reject an operation (for example because a log file cannot be
/// opened); the model is then left unchanged.
pub trait RuntimeStage: Send + Sync {
    fn apply(&self, operation: &Operation) -> ManagementResult<()>;
}

struct TreeInner {
    resources: BTreeMap<ResourceAddress, Resource>,
    stages: Vec<(ResourceAddress, Arc<dyn RuntimeStage>)>,
}

/// The hierarchical resource store of one embedded process.
pub struct ManagementTree {
    inner: Mutex<TreeInner>,
}

impl std::fmt::Debug for ManagementTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ManagementTree")
            .field("resources", &inner.resources.len())
            .field("stages", &inner.stages.len())
            .finish()
    }
}

impl Default for ManagementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementTree {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TreeInner {
                resources: BTreeMap::new(),
                stages: Vec::new(),
            }),
        }
    }

    /// Route mutations at or below `scope` through `stage`. When scopes nest,
    /// the most specific one wins.
    pub fn register_stage(&self, scope: ResourceAddress, stage: Arc<dyn RuntimeStage>) {
        let mut inner = self.inner.lock();
        inner.stages.push((scope, stage));
        inner
            .stages
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    }

    /// Execute one operation atomically.
    pub fn execute(&self, operation: &Operation) -> OperationResult {
        let result = self.apply(operation);
        match &result {
            Ok(_) => debug!(operation = %operation, "Operation succeeded"),
            Err(e) => debug!(operation = %operation, error = %e, "Operation failed"),
        }
        OperationResult::from(result)
    }

    pub fn contains(&self, address: &ResourceAddress) -> bool {
        self.inner.lock().resources.contains_key(address)
    }

    pub fn get(&self, address: &ResourceAddress) -> Option<Resource> {
        self.inner.lock().resources.get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().resources.is_empty()
    }

    /// Copy of the whole model, ordered by address.
    pub fn snapshot(&self) -> BTreeMap<ResourceAddress, Resource> {
        self.inner.lock().resources.clone()
    }

    fn apply(&self, operation: &Operation) -> ManagementResult<Value> {
        let mut inner = self.inner.lock();

        match operation {
            Operation::ReadResource { address } => inner
                .resources
                .get(address)
                .map(Resource::to_value)
                .ok_or_else(|| ManagementError::not_found(format!("resource {}", address))),

            Operation::ReadAttribute { address, attribute } => {
                let resource = inner.existing(address)?;
                resource.get(attribute).cloned().ok_or_else(|| {
                    ManagementError::not_found(format!("attribute '{}' of {}", attribute, address))
                })
            }

            Operation::AddResource {
                address,
                attributes,
            } => {
                if inner.resources.contains_key(address) {
                    return Err(ManagementError::duplicate_resource(address));
                }
                if let Some(parent) = address.parent() {
                    if !inner.resources.contains_key(&parent) {
                        return Err(ManagementError::missing_parent(address));
                    }
                }
                inner.run_stage(operation)?;
                inner
                    .resources
                    .insert(address.clone(), Resource::from_attributes(attributes.clone()));
                Ok(Value::Null)
            }

            Operation::RemoveResource { address } => {
                inner.existing(address)?;
                if let Some(child) = inner
                    .resources
                    .keys()
                    .find(|candidate| candidate.is_descendant_of(address))
                {
                    return Err(ManagementError::resource_in_use(
                        address,
                        format!("child resource {} still exists", child),
                    ));
                }
                let name = address.last().name.as_str();
                if let Some((holder, attribute)) = inner.referenced_by(name, address) {
                    return Err(ManagementError::resource_in_use(
                        address,
                        format!("'{}' is still listed in {} attribute '{}'", name, holder, attribute),
                    ));
                }
                inner.run_stage(operation)?;
                inner.resources.remove(address);
                Ok(Value::Null)
            }

            Operation::ListAppend {
                address,
                attribute,
                value,
                index,
            } => {
                let resource = inner.existing(address)?;
                let len = match resource.get(attribute) {
                    None => 0,
                    Some(Value::Array(list)) => list.len(),
                    Some(_) => {
                        return Err(ManagementError::invalid_operation(
                            operation.name(),
                            format!("attribute '{}' of {} is not a list", attribute, address),
                        ))
                    }
                };
                if let Some(index) = (*index).filter(|i| *i > len) {
                    return Err(ManagementError::invalid_operation(
                        operation.name(),
                        format!(
                            "index {} out of bounds for {} attribute '{}' of length {}",
                            index, address, attribute, len
                        ),
                    ));
                }
                if resource.list_contains(attribute, value) {
                    return Err(ManagementError::duplicate_value(
                        address,
                        attribute.as_str(),
                        render_value(value),
                    ));
                }
                if let Some(name) = value.as_str() {
                    let target_exists = inner
                        .resources
                        .keys()
                        .any(|candidate| candidate != address && candidate.last().name == name);
                    if !target_exists {
                        return Err(ManagementError::not_found(format!(
                            "resource named '{}' referenced from {} attribute '{}'",
                            name, address, attribute
                        )));
                    }
                }
                inner.run_stage(operation)?;
                if let Some(resource) = inner.resources.get_mut(address) {
                    resource.insert_into_list(attribute, *index, value.clone());
                }
                Ok(Value::Null)
            }

            Operation::ListRemove {
                address,
                attribute,
                value,
            } => {
                let resource = inner.existing(address)?;
                if !resource.list_contains(attribute, value) {
                    return Err(ManagementError::not_found(format!(
                        "value '{}' in {} attribute '{}'",
                        render_value(value),
                        address,
                        attribute
                    )));
                }
                inner.run_stage(operation)?;
                if let Some(resource) = inner.resources.get_mut(address) {
                    resource.remove_from_list(attribute, value);
                }
                Ok(Value::Null)
            }
        }
    }
}

impl TreeInner {
    fn existing(&self, address: &ResourceAddress) -> ManagementResult<&Resource> {
        self.resources
            .get(address)
            .ok_or_else(|| ManagementError::not_found(format!("resource {}", address)))
    }

    /// First resource other than `address` whose list attribute names `name`.
    fn referenced_by(&self, name: &str, address: &ResourceAddress) -> Option<(String, String)> {
        self.resources
            .iter()
            .filter(|(holder, _)| *holder != address)
            .find_map(|(holder, resource)| {
                resource
                    .list_referencing(name)
                    .map(|attribute| (holder.to_string(), attribute.to_string()))
            })
    }

    fn run_stage(&self, operation: &Operation) -> ManagementResult<()> {
        let stage = self
            .stages
            .iter()
            .find(|(scope, _)| operation.address().starts_with(scope));
        match stage {
            Some((_, stage)) => stage.apply(operation),
            None => Ok(()),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    fn addr(s: &str) -> ResourceAddress {
        s.parse().unwrap()
    }

    fn logging_tree() -> ManagementTree {
        let tree = ManagementTree::new();
        for op in [
            Operation::add_resource(addr("subsystem=logging"), BTreeMap::new()),
            Operation::add_resource(
                addr("subsystem=logging/console-handler=CONSOLE"),
                BTreeMap::from([("level".to_string(), json!("INFO"))]),
            ),
            Operation::add_resource(
                addr("subsystem=logging/root-logger=ROOT"),
                BTreeMap::from([("handlers".to_string(), json!(["CONSOLE"]))]),
            ),
        ] {
            assert!(tree.execute(&op).is_success());
        }
        tree
    }

    fn expect_err(tree: &ManagementTree, op: Operation) -> ManagementError {
        tree.execute(&op)
            .into_result()
            .expect_err("operation should fail")
    }

    #[test]
    fn test_add_duplicate_and_missing_parent() {
        let tree = logging_tree();

        let err = expect_err(
            &tree,
            Operation::add_resource(addr("subsystem=logging"), BTreeMap::new()),
        );
        assert!(matches!(err, ManagementError::DuplicateResource { .. }));

        let err = expect_err(
            &tree,
            Operation::add_resource(addr("subsystem=io/worker=default"), BTreeMap::new()),
        );
        assert!(matches!(err, ManagementError::MissingParent { .. }));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_remove_guards() {
        let tree = logging_tree();

        let err = expect_err(
            &tree,
            Operation::remove_resource(addr("subsystem=logging/file-handler=NOPE")),
        );
        assert!(matches!(err, ManagementError::NotFound { .. }));

        // Still listed by the root logger
        let err = expect_err(
            &tree,
            Operation::remove_resource(addr("subsystem=logging/console-handler=CONSOLE")),
        );
        assert!(matches!(err, ManagementError::ResourceInUse { .. }));
        assert!(err.to_string().contains("root-logger=ROOT"));

        // Has children
        let err = expect_err(&tree, Operation::remove_resource(addr("subsystem=logging")));
        assert!(matches!(err, ManagementError::ResourceInUse { .. }));

        // Detach first, then removal succeeds
        let detach = Operation::list_remove(
            addr("subsystem=logging/root-logger=ROOT"),
            "handlers",
            "CONSOLE",
        );
        assert!(tree.execute(&detach).is_success());
        let remove = Operation::remove_resource(addr("subsystem=logging/console-handler=CONSOLE"));
        assert!(tree.execute(&remove).is_success());
    }

    #[test]
    fn test_list_append_guards() {
        let tree = logging_tree();
        let root = addr("subsystem=logging/root-logger=ROOT");

        let err = expect_err(&tree, Operation::list_append(root.clone(), "handlers", "CONSOLE"));
        assert!(matches!(err, ManagementError::DuplicateValue { .. }));

        // No resource carries that name
        let err = expect_err(&tree, Operation::list_append(root.clone(), "handlers", "GHOST"));
        assert!(matches!(err, ManagementError::NotFound { .. }));

        let add = Operation::add_resource(
            addr("subsystem=logging/file-handler=FILE"),
            BTreeMap::new(),
        );
        assert!(tree.execute(&add).is_success());
        assert!(tree
            .execute(&Operation::list_append(root.clone(), "handlers", "FILE"))
            .is_success());
        assert_eq!(
            tree.get(&root).unwrap().get("handlers"),
            Some(&json!(["CONSOLE", "FILE"]))
        );
    }

    #[test]
    fn test_list_insert_at_position() {
        let tree = logging_tree();
        let root = addr("subsystem=logging/root-logger=ROOT");
        for name in ["FILE", "AUDIT"] {
            let add = Operation::add_resource(
                addr(&format!("subsystem=logging/file-handler={}", name)),
                BTreeMap::new(),
            );
            assert!(tree.execute(&add).is_success());
        }

        let before = tree.snapshot();
        let err = expect_err(&tree, Operation::list_insert(root.clone(), "handlers", 2, "FILE"));
        assert!(matches!(err, ManagementError::InvalidOperation { .. }));
        assert_eq!(tree.snapshot(), before);

        assert!(tree
            .execute(&Operation::list_insert(root.clone(), "handlers", 0, "FILE"))
            .is_success());
        assert!(tree
            .execute(&Operation::list_insert(root.clone(), "handlers", 1, "AUDIT"))
            .is_success());
        assert_eq!(
            tree.get(&root).unwrap().get("handlers"),
            Some(&json!(["FILE", "AUDIT", "CONSOLE"]))
        );
    }

    #[test]
    fn test_list_remove_absent_value() {
        let tree = logging_tree();
        let before = tree.snapshot();
        let err = expect_err(
            &tree,
            Operation::list_remove(addr("subsystem=logging/root-logger=ROOT"), "handlers", "FILE"),
        );
        assert!(matches!(err, ManagementError::NotFound { .. }));
        assert_eq!(tree.snapshot(), before);
    }

    #[test]
    fn test_list_append_rejects_scalar_attribute() {
        let tree = logging_tree();
        let err = expect_err(
            &tree,
            Operation::list_append(
                addr("subsystem=logging/console-handler=CONSOLE"),
                "level",
                "CONSOLE",
            ),
        );
        assert!(matches!(err, ManagementError::InvalidOperation { .. }));
    }

    #[test]
    fn test_reads() {
        let tree = logging_tree();
        let value = tree
            .execute(&Operation::read_attribute(
                addr("subsystem=logging/root-logger=ROOT"),
                "handlers",
            ))
            .into_result()
            .unwrap();
        assert_eq!(value, json!(["CONSOLE"]));

        let value = tree
            .execute(&Operation::read_resource(addr(
                "subsystem=logging/console-handler=CONSOLE",
            )))
            .into_result()
            .unwrap();
        assert_eq!(value, json!({"level": "INFO"}));

        let err = expect_err(
            &tree,
            Operation::read_attribute(addr("subsystem=logging/root-logger=ROOT"), "level"),
        );
        assert!(matches!(err, ManagementError::NotFound { .. }));
    }

    struct RecordingStage {
        seen: PlMutex<Vec<String>>,
        reject: Option<&'static str>,
    }

    impl RuntimeStage for RecordingStage {
        fn apply(&self, operation: &Operation) -> ManagementResult<()> {
            if self.reject == Some(operation.name()) {
                return Err(ManagementError::runtime_failure(
                    operation.name(),
                    operation.address(),
                    "rejected by test stage",
                ));
            }
            self.seen.lock().push(operation.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_stage_rejection_leaves_model_unchanged() {
        let tree = logging_tree();
        let stage = Arc::new(RecordingStage {
            seen: PlMutex::new(Vec::new()),
            reject: Some("add"),
        });
        tree.register_stage(addr("subsystem=logging"), stage.clone());

        let before = tree.snapshot();
        let err = expect_err(
            &tree,
            Operation::add_resource(addr("subsystem=logging/file-handler=FILE"), BTreeMap::new()),
        );
        assert!(matches!(err, ManagementError::RuntimeFailure { .. }));
        assert_eq!(tree.snapshot(), before);

        // Other operations reach the stage; validation failures never do
        let root = addr("subsystem=logging/root-logger=ROOT");
        assert!(tree
            .execute(&Operation::list_remove(root.clone(), "handlers", "CONSOLE"))
            .is_success());
        assert!(!tree
            .execute(&Operation::list_remove(root, "handlers", "CONSOLE"))
            .is_success());
        assert_eq!(
            *stage.seen.lock(),
            vec!["subsystem=logging/root-logger=ROOT:list-remove".to_string()]
        );
    }
}
