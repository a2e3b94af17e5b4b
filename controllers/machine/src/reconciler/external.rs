//! External reference resolver
//!
//! Fetches and deletes the provider-owned resources a Machine points at. The
//! concrete type of those resources is unknown; they are addressed through
//! the kind table and returned as `DynamicObject`s.

use super::bounded;
use crate::error::ControllerError;
use crds::ObjectReference;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use object_store::{KindRegistry, ObjectStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of looking up a reference
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The resource exists
    Found(DynamicObject),
    /// The resource does not exist (never created, or already deleted)
    NotFound,
}

/// Resolves references against the object store
pub struct ExternalResolver {
    store: Arc<dyn ObjectStore>,
    kinds: KindRegistry,
    timeout: Duration,
}

impl std::fmt::Debug for ExternalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalResolver")
            .field("kinds", &self.kinds.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ExternalResolver {
    /// Create a resolver that addresses references through `kinds`
    /// and bounds every store call by `timeout`
    pub fn new(store: Arc<dyn ObjectStore>, kinds: KindRegistry, timeout: Duration) -> Self {
        Self { store, kinds, timeout }
    }

    fn api_resource(&self, reference: &ObjectReference) -> Result<ApiResource, ControllerError> {
        if !reference.is_complete() {
            return Err(ControllerError::InvalidSpec(format!(
                "reference {reference} must set apiVersion, kind and name"
            )));
        }
        self.kinds.api_resource(reference).ok_or_else(|| {
            ControllerError::UnregisteredKind(format!("{} in group '{}'", reference.kind, reference.group()))
        })
    }

    /// Look up the resource named by `reference`
    ///
    /// `default_namespace` applies when the reference does not name one.
    pub async fn resolve(
        &self,
        reference: &ObjectReference,
        default_namespace: &str,
    ) -> Result<Resolved, ControllerError> {
        let resource = self.api_resource(reference)?;
        let namespace = reference.namespace_or(default_namespace);
        let found = bounded(
            self.timeout,
            || format!("get {} {}/{}", reference.kind, namespace, reference.name),
            self.store.get_dynamic(&resource, namespace, &reference.name),
        )
        .await?;
        match found {
            Some(object) => Ok(Resolved::Found(object)),
            None => {
                debug!("{} {}/{} not found", reference.kind, namespace, reference.name);
                Ok(Resolved::NotFound)
            }
        }
    }

    /// Request deletion of the resource named by `reference`
    ///
    /// Deleting a resource that is already gone succeeds.
    pub async fn delete(&self, reference: &ObjectReference, default_namespace: &str) -> Result<(), ControllerError> {
        let resource = self.api_resource(reference)?;
        let namespace = reference.namespace_or(default_namespace);
        bounded(
            self.timeout,
            || format!("delete {} {}/{}", reference.kind, namespace, reference.name),
            self.store.delete_dynamic(&resource, namespace, &reference.name),
        )
        .await
    }
}
