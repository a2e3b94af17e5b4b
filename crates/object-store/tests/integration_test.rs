//! Integration tests for the Kubernetes-backed object store
//!
//! These tests require a reachable cluster with the Machine CRD installed
//! (`cargo run -p crds --bin crdgen | kubectl apply -f -`).

use object_store::{KindRegistry, KubeObjectStore, ObjectKey, ObjectStore};

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_missing_machine_is_none() {
    let client = kube::Client::try_default().await.expect("Failed to create client");
    let store = KubeObjectStore::new(client);

    let machine = store
        .get_machine(&ObjectKey::new("default", "does-not-exist-7f3a"))
        .await
        .expect("Failed to query machines");
    assert!(machine.is_none());
}

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_missing_dynamic_object_is_none_and_delete_is_noop() {
    let client = kube::Client::try_default().await.expect("Failed to create client");
    let store = KubeObjectStore::new(client);
    let registry = KindRegistry::new().with_kind("", "ConfigMap", "configmaps");
    let reference = crds::ObjectReference::new("v1", "ConfigMap", "does-not-exist-7f3a");
    let resource = registry.api_resource(&reference).expect("ConfigMap is registered");

    let object = store
        .get_dynamic(&resource, "default", &reference.name)
        .await
        .expect("Failed to query configmaps");
    assert!(object.is_none());

    store
        .delete_dynamic(&resource, "default", &reference.name)
        .await
        .expect("Deleting a missing object should succeed");
}
