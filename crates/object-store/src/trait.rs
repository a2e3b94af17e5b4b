//! ObjectStore trait for mocking
//!
//! This trait abstracts the object store so the reconciler can run against
//! the Kubernetes API in production and an in-memory mock in unit tests.

use crate::error::StoreError;
use crds::Machine;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;

/// Identifies a namespaced object: the reconcile key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Trait for object store operations
///
/// Writes are guarded by the `metadata.resourceVersion` carried on the
/// object passed in; a stale version fails with [`StoreError::Conflict`].
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a Machine; `Ok(None)` when it does not exist
    async fn get_machine(&self, key: &ObjectKey) -> Result<Option<Machine>, StoreError>;

    /// Write the Machine's finalizers and spec, returning the stored object
    async fn update_machine(&self, machine: &Machine) -> Result<Machine, StoreError>;

    /// Write the Machine's status subresource, returning the stored object
    async fn update_machine_status(&self, machine: &Machine) -> Result<Machine, StoreError>;

    /// Fetch a loosely-typed object; `Ok(None)` when it does not exist
    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    /// Request deletion of a loosely-typed object; deleting a missing object succeeds
    async fn delete_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError>;
}
