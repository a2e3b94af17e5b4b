//! Mock ObjectStore for unit testing
//!
//! Keeps Machines and loosely-typed provider objects in memory and mimics the
//! API server behaviour the reconciler depends on: version-token checks on
//! writes, erasure of deleting objects once their finalizers are gone, and
//! not-found tolerant deletes. Failures and latency can be injected.

use crate::error::StoreError;
use crate::store_trait::{ObjectKey, ObjectStore};
use crds::Machine;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `get_machine`
    GetMachine,
    /// `update_machine`
    UpdateMachine,
    /// `update_machine_status`
    UpdateMachineStatus,
    /// `get_dynamic`
    GetDynamic,
    /// `delete_dynamic`
    DeleteDynamic,
}

/// Kind of failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Fail as if the version token were stale
    Conflict,
    /// Fail as if the API server were unreachable
    Transient,
}

impl MockFailure {
    fn to_error(self, op: MockOp) -> StoreError {
        match self {
            Self::Conflict => StoreError::Conflict(format!("injected conflict on {op:?}")),
            Self::Transient => StoreError::Transient(format!("injected failure on {op:?}")),
        }
    }
}

/// (group, kind, namespace, name)
type DynamicKey = (String, String, String, String);

/// A delete request observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Kind of the object
    pub kind: String,
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

#[derive(Debug, Default)]
struct State {
    machines: HashMap<ObjectKey, Machine>,
    objects: HashMap<DynamicKey, DynamicObject>,
    next_version: u64,
    one_shot_failures: HashMap<MockOp, MockFailure>,
    failing_kinds: HashMap<String, MockFailure>,
    delete_requests: Vec<DeleteRequest>,
    machine_writes: usize,
    status_writes: usize,
    deletes_are_immediate: bool,
    latency: Option<Duration>,
}

/// Mock ObjectStore for testing
#[derive(Debug, Clone)]
pub struct MockObjectStore {
    state: Arc<Mutex<State>>,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn dynamic_key(resource: &ApiResource, namespace: &str, name: &str) -> DynamicKey {
    (
        resource.group.clone(),
        resource.kind.clone(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn machine_key(machine: &Machine) -> ObjectKey {
    ObjectKey::new(
        machine.namespace_or_default(),
        machine.metadata.name.clone().unwrap_or_default(),
    )
}

impl MockObjectStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_version: 1,
                deletes_are_immediate: true,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_version(state: &mut State) -> String {
        let version = state.next_version;
        state.next_version += 1;
        version.to_string()
    }

    /// Add a Machine to the mock store (for test setup), returning the stored copy
    pub fn add_machine(&self, mut machine: Machine) -> Machine {
        let mut state = self.lock();
        machine.metadata.resource_version = Some(Self::bump_version(&mut state));
        if machine.metadata.namespace.is_none() {
            machine.metadata.namespace = Some("default".to_string());
        }
        state.machines.insert(machine_key(&machine), machine.clone());
        machine
    }

    /// Current stored copy of a Machine
    pub fn machine(&self, key: &ObjectKey) -> Option<Machine> {
        self.lock().machines.get(key).cloned()
    }

    /// Simulate a concurrent writer by advancing the Machine's version token
    pub fn touch_machine(&self, key: &ObjectKey) {
        let mut state = self.lock();
        let version = Self::bump_version(&mut state);
        if let Some(machine) = state.machines.get_mut(key) {
            machine.metadata.resource_version = Some(version);
        }
    }

    /// Simulate a delete request against a Machine
    ///
    /// Erases it when no finalizers are set, otherwise sets the deletion marker.
    pub fn request_machine_deletion(&self, key: &ObjectKey) {
        let mut state = self.lock();
        let version = Self::bump_version(&mut state);
        let erase = match state.machines.get_mut(key) {
            Some(machine) => {
                if machine.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
                    true
                } else {
                    machine.metadata.deletion_timestamp =
                        serde_json::from_value::<Time>(serde_json::json!("2024-01-01T00:00:00Z")).ok();
                    machine.metadata.resource_version = Some(version);
                    false
                }
            }
            None => false,
        };
        if erase {
            state.machines.remove(key);
        }
    }

    /// Add a provider object with the given payload (for test setup)
    ///
    /// `data` holds everything but `apiVersion`, `kind`, and `metadata`,
    /// typically `{"spec": ..., "status": ...}`.
    pub fn add_object(&self, resource: &ApiResource, namespace: &str, name: &str, data: serde_json::Value) {
        let object = DynamicObject::new(name, resource).within(namespace).data(data);
        self.lock()
            .objects
            .insert(dynamic_key(resource, namespace, name), object);
    }

    /// Remove a provider object as if its own controller finished deleting it
    pub fn remove_object(&self, resource: &ApiResource, namespace: &str, name: &str) {
        self.lock()
            .objects
            .remove(&dynamic_key(resource, namespace, name));
    }

    /// Whether a provider object currently exists
    pub fn has_object(&self, resource: &ApiResource, namespace: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&dynamic_key(resource, namespace, name))
    }

    /// When false, delete requests are recorded but objects stay until removed
    /// explicitly, mimicking providers that hold their own finalizers
    pub fn set_deletes_are_immediate(&self, immediate: bool) {
        self.lock().deletes_are_immediate = immediate;
    }

    /// Fail the next call of `op` once
    pub fn fail_next(&self, op: MockOp, failure: MockFailure) {
        self.lock().one_shot_failures.insert(op, failure);
    }

    /// Fail every read and delete of provider objects of `kind` until cleared
    pub fn fail_kind(&self, kind: &str, failure: MockFailure) {
        self.lock().failing_kinds.insert(kind.to_string(), failure);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.one_shot_failures.clear();
        state.failing_kinds.clear();
    }

    /// Delay every call by `latency` (use with a paused Tokio clock)
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Delete requests observed so far
    pub fn delete_requests(&self) -> Vec<DeleteRequest> {
        self.lock().delete_requests.clone()
    }

    /// Number of successful finalizer/spec writes
    pub fn machine_writes(&self) -> usize {
        self.lock().machine_writes
    }

    /// Number of successful status writes
    pub fn status_writes(&self) -> usize {
        self.lock().status_writes
    }

    async fn before_call(&self, op: MockOp, kind: Option<&str>) -> Result<(), StoreError> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        if let Some(failure) = state.one_shot_failures.remove(&op) {
            return Err(failure.to_error(op));
        }
        if let Some(failure) = kind.and_then(|k| state.failing_kinds.get(k)) {
            return Err(failure.to_error(op));
        }
        Ok(())
    }

    /// Apply a guarded write to the stored Machine
    fn write_machine(&self, machine: &Machine, apply: impl FnOnce(&mut Machine, &Machine)) -> Result<Machine, StoreError> {
        let key = machine_key(machine);
        let mut state = self.lock();
        let version = Self::bump_version(&mut state);
        let stored = state
            .machines
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("Machine {key}")))?;
        if stored.metadata.resource_version != machine.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "Machine {key}: resourceVersion {:?} is stale (current {:?})",
                machine.metadata.resource_version, stored.metadata.resource_version
            )));
        }
        apply(stored, machine);
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        // The store erases a deleting object as soon as its last finalizer is gone
        if updated.is_deleting() && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            state.machines.remove(&key);
        }
        Ok(updated)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_machine(&self, key: &ObjectKey) -> Result<Option<Machine>, StoreError> {
        self.before_call(MockOp::GetMachine, None).await?;
        Ok(self.lock().machines.get(key).cloned())
    }

    async fn update_machine(&self, machine: &Machine) -> Result<Machine, StoreError> {
        self.before_call(MockOp::UpdateMachine, None).await?;
        let updated = self.write_machine(machine, |stored, desired| {
            stored.metadata.finalizers = desired.metadata.finalizers.clone();
            stored.spec = desired.spec.clone();
        })?;
        self.lock().machine_writes += 1;
        Ok(updated)
    }

    async fn update_machine_status(&self, machine: &Machine) -> Result<Machine, StoreError> {
        self.before_call(MockOp::UpdateMachineStatus, None).await?;
        let updated = self.write_machine(machine, |stored, desired| {
            stored.status = desired.status.clone();
        })?;
        self.lock().status_writes += 1;
        Ok(updated)
    }

    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        self.before_call(MockOp::GetDynamic, Some(&resource.kind)).await?;
        Ok(self
            .lock()
            .objects
            .get(&dynamic_key(resource, namespace, name))
            .cloned())
    }

    async fn delete_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.before_call(MockOp::DeleteDynamic, Some(&resource.kind)).await?;
        let mut state = self.lock();
        state.delete_requests.push(DeleteRequest {
            kind: resource.kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if state.deletes_are_immediate {
            state.objects.remove(&dynamic_key(resource, namespace, name));
        }
        Ok(())
    }
}
