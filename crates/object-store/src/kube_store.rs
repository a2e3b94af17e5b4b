//! Kubernetes-backed object store
//!
//! Implements [`ObjectStore`] on top of the Kubernetes API. Machine writes are
//! JSON merge patches that carry `metadata.resourceVersion`, so the API server
//! rejects a write made against a stale read with 409 Conflict.

use crate::error::StoreError;
use crate::store_trait::{ObjectKey, ObjectStore};
use crds::{Machine, MachineStatus};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Object store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl std::fmt::Debug for KubeObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore").finish_non_exhaustive()
    }
}

impl KubeObjectStore {
    /// Create a store using an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn machines(&self, namespace: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn dynamic(&self, resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }
}

/// Namespace, name, and version token of a machine about to be written
fn write_target(machine: &Machine) -> Result<(&str, &str, &str), StoreError> {
    let name = machine
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::NotFound("Machine has no name".to_string()))?;
    // Without a version token the write could not detect a concurrent modification
    let resource_version = machine
        .metadata
        .resource_version
        .as_deref()
        .ok_or_else(|| StoreError::Conflict(format!("Machine {name} has no resourceVersion")))?;
    Ok((machine.namespace_or_default(), name, resource_version))
}

/// Merge patch writing finalizers and spec under the given version token
pub(crate) fn machine_patch_body(machine: &Machine, resource_version: &str) -> Result<Value, StoreError> {
    Ok(json!({
        "metadata": {
            "resourceVersion": resource_version,
            "finalizers": machine.metadata.finalizers.clone().unwrap_or_default(),
        },
        "spec": serde_json::to_value(&machine.spec)?,
    }))
}

/// Merge patch writing the full status under the given version token
///
/// Optional fields that are unset are sent as explicit nulls and the address
/// list is always sent, so values cleared by the reconciler are removed from
/// the stored object instead of being left behind by the merge.
pub(crate) fn status_patch_body(status: &MachineStatus, resource_version: &str) -> Result<Value, StoreError> {
    let mut body = serde_json::to_value(status)?;
    if let Value::Object(fields) = &mut body {
        fields
            .entry("addresses")
            .or_insert_with(|| Value::Array(Vec::new()));
        for key in ["providerID", "failureReason", "failureMessage"] {
            fields.entry(key).or_insert(Value::Null);
        }
    }
    Ok(json!({
        "metadata": { "resourceVersion": resource_version },
        "status": body,
    }))
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_machine(&self, key: &ObjectKey) -> Result<Option<Machine>, StoreError> {
        debug!("Fetching Machine {}", key);
        Ok(self.machines(&key.namespace).get_opt(&key.name).await?)
    }

    async fn update_machine(&self, machine: &Machine) -> Result<Machine, StoreError> {
        let (namespace, name, resource_version) = write_target(machine)?;
        let patch = machine_patch_body(machine, resource_version)?;
        debug!("Patching Machine {}/{} at resourceVersion {}", namespace, name, resource_version);
        let pp = PatchParams::default();
        Ok(self
            .machines(namespace)
            .patch(name, &pp, &Patch::Merge(&patch))
            .await?)
    }

    async fn update_machine_status(&self, machine: &Machine) -> Result<Machine, StoreError> {
        let (namespace, name, resource_version) = write_target(machine)?;
        let status = machine.status.clone().unwrap_or_default();
        let patch = status_patch_body(&status, resource_version)?;
        debug!("Patching Machine {}/{} status at resourceVersion {}", namespace, name, resource_version);
        let pp = PatchParams::default();
        Ok(self
            .machines(namespace)
            .patch_status(name, &pp, &Patch::Merge(&patch))
            .await?)
    }

    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        debug!("Fetching {} {}/{}", resource.kind, namespace, name);
        Ok(self.dynamic(resource, namespace).get_opt(name).await?)
    }

    async fn delete_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        debug!("Deleting {} {}/{}", resource.kind, namespace, name);
        match self
            .dynamic(resource, namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            // Already gone: nothing left to delete
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{MachineAddress, MachinePhase};

    #[test]
    fn test_status_patch_clears_removed_fields() {
        let status = MachineStatus {
            ready: false,
            phase: MachinePhase::Pending,
            ..Default::default()
        };
        let body = status_patch_body(&status, "42").unwrap();
        assert_eq!(body["metadata"]["resourceVersion"], json!("42"));
        assert_eq!(body["status"]["addresses"], json!([]));
        assert_eq!(body["status"]["providerID"], Value::Null);
        assert_eq!(body["status"]["failureReason"], Value::Null);
        assert_eq!(body["status"]["failureMessage"], Value::Null);
        assert_eq!(body["status"]["ready"], json!(false));
    }

    #[test]
    fn test_status_patch_keeps_set_fields() {
        let status = MachineStatus {
            ready: true,
            addresses: vec![MachineAddress::new("InternalIP", "10.0.0.1")],
            provider_id: Some("test://id-1".to_string()),
            phase: MachinePhase::Running,
            ..Default::default()
        };
        let body = status_patch_body(&status, "7").unwrap();
        assert_eq!(
            body["status"]["addresses"],
            json!([{ "type": "InternalIP", "address": "10.0.0.1" }])
        );
        assert_eq!(body["status"]["providerID"], json!("test://id-1"));
        assert_eq!(body["status"]["phase"], json!("Running"));
    }

    #[test]
    fn test_machine_patch_carries_finalizers_and_spec() {
        let mut machine = Machine::new("m", crds::MachineSpec {
            infrastructure_ref: crds::ObjectReference::new("v1", "Kind", "infra"),
            provider_id: Some("test://id-1".to_string()),
            ..Default::default()
        });
        machine.metadata.finalizers = Some(vec![crds::MACHINE_FINALIZER.to_string()]);
        let body = machine_patch_body(&machine, "3").unwrap();
        assert_eq!(body["metadata"]["finalizers"], json!([crds::MACHINE_FINALIZER]));
        assert_eq!(body["spec"]["providerID"], json!("test://id-1"));
        assert_eq!(body["spec"]["infrastructureRef"]["name"], json!("infra"));
    }

    #[test]
    fn test_machine_patch_sends_empty_finalizer_list() {
        let machine = Machine::new("m", crds::MachineSpec::default());
        let body = machine_patch_body(&machine, "3").unwrap();
        assert_eq!(body["metadata"]["finalizers"], json!([]));
    }

    #[test]
    fn test_write_target_requires_resource_version() {
        let machine = Machine::new("m", crds::MachineSpec::default());
        assert!(matches!(write_target(&machine), Err(StoreError::Conflict(_))));
    }
}
