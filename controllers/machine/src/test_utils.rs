//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::{ReconcileSettings, Reconciler};
use crds::{Bootstrap, MACHINE_FINALIZER, Machine, MachineSpec, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::discovery::ApiResource;
use object_store::{KindRegistry, MockObjectStore, ObjectKey};
use std::sync::Arc;
use std::time::Duration;

pub const INFRA_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1alpha2";
pub const INFRA_KIND: &str = "InfrastructureConfig";
pub const BOOTSTRAP_API_VERSION: &str = "bootstrap.cluster.x-k8s.io/v1alpha2";
pub const BOOTSTRAP_KIND: &str = "BootstrapConfig";

/// Kind table knowing the test infrastructure and bootstrap kinds
pub fn test_kinds() -> KindRegistry {
    KindRegistry::new()
        .with_kind("infrastructure.cluster.x-k8s.io", INFRA_KIND, "infrastructureconfigs")
        .with_kind("bootstrap.cluster.x-k8s.io", BOOTSTRAP_KIND, "bootstrapconfigs")
}

pub fn infra_ref(name: &str) -> ObjectReference {
    ObjectReference::new(INFRA_API_VERSION, INFRA_KIND, name)
}

pub fn bootstrap_ref(name: &str) -> ObjectReference {
    ObjectReference::new(BOOTSTRAP_API_VERSION, BOOTSTRAP_KIND, name)
}

pub fn infra_resource() -> ApiResource {
    test_kinds()
        .api_resource(&infra_ref("any"))
        .unwrap()
}

pub fn bootstrap_resource() -> ApiResource {
    test_kinds()
        .api_resource(&bootstrap_ref("any"))
        .unwrap()
}

/// Machine in `default` pointing at infrastructure `infra-config1`, without finalizers
pub fn create_test_machine(name: &str) -> Machine {
    Machine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: MachineSpec {
            infrastructure_ref: infra_ref("infra-config1"),
            bootstrap: Bootstrap::default(),
            provider_id: None,
        },
        status: None,
    }
}

/// Machine that also points at bootstrap resource `bootstrap-config1`
pub fn create_test_machine_with_bootstrap(name: &str) -> Machine {
    let mut machine = create_test_machine(name);
    machine.spec.bootstrap.config_ref = Some(bootstrap_ref("bootstrap-config1"));
    machine
}

/// Same as `machine` but already carrying the controller's finalizer
pub fn with_finalizer(mut machine: Machine) -> Machine {
    machine.metadata.finalizers = Some(vec![MACHINE_FINALIZER.to_string()]);
    machine
}

pub fn machine_key(name: &str) -> ObjectKey {
    ObjectKey::new("default", name)
}

pub fn test_settings() -> ReconcileSettings {
    ReconcileSettings {
        external_requeue: Duration::from_secs(30),
        delete_requeue: Duration::from_secs(10),
        request_timeout: Duration::from_secs(10),
    }
}

/// Reconciler running against `store`
pub fn create_test_reconciler(store: &MockObjectStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), test_kinds(), test_settings())
}
