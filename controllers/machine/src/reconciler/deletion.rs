//! Ordered teardown of provider resources

use super::Reconciler;
use super::external::Resolved;
use crate::error::ControllerError;
use crds::{Machine, ObjectReference};
use tracing::info;

impl Reconciler {
    /// Delete the Machine's provider resources
    ///
    /// Returns `true` only once both the bootstrap resource (if any) and the
    /// infrastructure resource are gone. A resource that still exists gets a
    /// delete request in this pass; its removal is observed in a later one.
    pub(crate) async fn reconcile_delete_external(&self, machine: &Machine) -> Result<bool, ControllerError> {
        let namespace = machine.namespace_or_default();
        let mut gone = true;

        if let Some(config_ref) = &machine.spec.bootstrap.config_ref {
            gone &= self.delete_dependent(config_ref, namespace).await?;
        }
        gone &= self
            .delete_dependent(&machine.spec.infrastructure_ref, namespace)
            .await?;

        Ok(gone)
    }

    /// Returns whether the referenced resource is already gone
    async fn delete_dependent(&self, reference: &ObjectReference, namespace: &str) -> Result<bool, ControllerError> {
        match self.resolver.resolve(reference, namespace).await? {
            Resolved::Found(_) => {
                info!("Deleting {} for Machine in namespace {}", reference, namespace);
                self.resolver.delete(reference, namespace).await?;
                Ok(false)
            }
            Resolved::NotFound => Ok(true),
        }
    }
}
