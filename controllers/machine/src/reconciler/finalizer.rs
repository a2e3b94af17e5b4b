//! Finalizer management
//!
//! The controller's finalizer keeps a Machine in the store until its provider
//! resources are gone. Adding and removing it are set operations on the
//! finalizer list; the store is only written when the list actually changes.

use super::{Reconciler, bounded};
use crate::error::ControllerError;
use crds::{MACHINE_FINALIZER, Machine};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

/// Add `token` to the finalizer list; returns whether the list changed
pub fn add_finalizer(metadata: &mut ObjectMeta, token: &str) -> bool {
    let finalizers = metadata.finalizers.get_or_insert_with(Vec::new);
    if finalizers.iter().any(|f| f == token) {
        return false;
    }
    finalizers.push(token.to_string());
    true
}

/// Remove every occurrence of `token`; returns whether the list changed
pub fn remove_finalizer(metadata: &mut ObjectMeta, token: &str) -> bool {
    let Some(finalizers) = metadata.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != token);
    finalizers.len() != before
}

impl Reconciler {
    /// Make sure the Machine carries the controller's finalizer
    pub(crate) async fn ensure_finalizer(&self, machine: Machine) -> Result<Machine, ControllerError> {
        self.write_finalizers(machine, |metadata| add_finalizer(metadata, MACHINE_FINALIZER))
            .await
    }

    /// Drop the controller's finalizer so the store can erase the Machine
    pub(crate) async fn release_finalizer(&self, machine: Machine) -> Result<Machine, ControllerError> {
        self.write_finalizers(machine, |metadata| remove_finalizer(metadata, MACHINE_FINALIZER))
            .await
    }

    async fn write_finalizers(
        &self,
        mut machine: Machine,
        change: impl FnOnce(&mut ObjectMeta) -> bool,
    ) -> Result<Machine, ControllerError> {
        if !change(&mut machine.metadata) {
            return Ok(machine);
        }
        let key = format!(
            "{}/{}",
            machine.namespace_or_default(),
            machine.metadata.name.as_deref().unwrap_or_default()
        );
        info!("Machine {}: updating finalizers to {:?}", key, machine.metadata.finalizers);
        bounded(
            self.settings.request_timeout,
            || format!("update finalizers of Machine {key}"),
            self.store.update_machine(&machine),
        )
        .await
    }
}
