//! Reconciliation logic for Machines.
//!
//! One call to [`Reconciler::reconcile`] runs a single pass for one Machine:
//! fetch it fresh, then either drive it toward its provider resources or
//! tear those resources down and release the finalizer. Nothing is carried
//! over between passes; every decision is re-derived from the stored objects.
//!
//! Submodules:
//! - `external`: resolves and deletes provider resources by reference
//! - `status`: projects provider payloads into Machine status
//! - `finalizer`: keeps the controller's finalizer on the Machine
//! - `deletion`: ordered teardown of provider resources
//! - `bootstrap`: bootstrap readiness and data defaulting

pub mod bootstrap;
pub mod deletion;
pub mod external;
pub mod finalizer;
pub mod status;


use crate::config::Config;
use crate::error::ControllerError;
use crds::{MACHINE_FINALIZER, Machine, MachinePhase, MachineStatus};
use external::{ExternalResolver, Resolved};
use object_store::{KindRegistry, ObjectKey, ObjectStore, StoreError};
use status::{derive_phase, project_infrastructure};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Run a store call under a deadline
///
/// `describe` names the call in the timeout error and is only evaluated
/// when the deadline passes.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    describe: impl FnOnce() -> String,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, ControllerError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => Ok(result?),
        Err(_elapsed) => Err(ControllerError::Timeout(format!(
            "{} did not complete within {}s",
            describe(),
            timeout.as_secs()
        ))),
    }
}

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the Machine or its providers change
    Done,
    /// Run another pass after the given delay
    RequeueAfter(Duration),
}

/// Timing knobs for the reconcile pass
#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    pub external_requeue: Duration,
    pub delete_requeue: Duration,
    pub request_timeout: Duration,
}

impl From<&Config> for ReconcileSettings {
    fn from(config: &Config) -> Self {
        Self {
            external_requeue: config.external_requeue,
            delete_requeue: config.delete_requeue,
            request_timeout: config.request_timeout,
        }
    }
}

/// Reconciles Machines against their provider resources.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) resolver: ExternalResolver,
    pub(crate) settings: ReconcileSettings,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("resolver", &self.resolver)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: Arc<dyn ObjectStore>, kinds: KindRegistry, settings: ReconcileSettings) -> Self {
        let resolver = ExternalResolver::new(Arc::clone(&store), kinds, settings.request_timeout);
        Self {
            store,
            resolver,
            settings,
        }
    }

    /// Run one pass for the Machine identified by `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let machine = bounded(
            self.settings.request_timeout,
            || format!("get Machine {key}"),
            self.store.get_machine(key),
        )
        .await?;

        let Some(machine) = machine else {
            debug!("Machine {} no longer exists", key);
            return Ok(ReconcileOutcome::Done);
        };

        if machine.is_deleting() {
            self.reconcile_delete(machine, key).await
        } else {
            self.reconcile_normal(machine, key).await
        }
    }

    async fn reconcile_normal(&self, machine: Machine, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        validate_spec(&machine)?;
        let machine = self.ensure_finalizer(machine).await?;
        let namespace = machine.namespace_or_default().to_string();

        let infra = self
            .resolver
            .resolve(&machine.spec.infrastructure_ref, &namespace)
            .await?;
        let Resolved::Found(infra) = infra else {
            let current = machine.status.clone().unwrap_or_default();
            let mut desired = MachineStatus {
                ready: false,
                addresses: Vec::new(),
                ..current
            };
            desired.phase = derive_phase(&desired);
            info!(
                "Machine {}: infrastructure {} not found, retrying in {}s",
                key,
                machine.spec.infrastructure_ref,
                self.settings.external_requeue.as_secs()
            );
            self.write_status_if_changed(machine, desired).await?;
            return Ok(ReconcileOutcome::RequeueAfter(self.settings.external_requeue));
        };

        let view = project_infrastructure(&infra.data);
        let bootstrap = self.reconcile_bootstrap(&machine).await?;

        // Defaulted spec fields: providerID from the infrastructure resource,
        // bootstrap data from a ready bootstrap resource
        let mut spec = machine.spec.clone();
        if spec.provider_id.is_none() {
            spec.provider_id.clone_from(&view.provider_id);
        }
        if let Some(data) = bootstrap.data {
            spec.bootstrap.data = Some(data);
        }
        let machine = if spec == machine.spec {
            machine
        } else {
            let mut desired = machine;
            desired.spec = spec;
            info!("Machine {}: setting defaulted spec fields", key);
            bounded(
                self.settings.request_timeout,
                || format!("update Machine {key}"),
                self.store.update_machine(&desired),
            )
            .await?
        };

        let mut desired = MachineStatus {
            ready: view.ready,
            bootstrap_ready: bootstrap.ready,
            addresses: view.addresses,
            provider_id: view.provider_id.or_else(|| machine.spec.provider_id.clone()),
            phase: MachinePhase::Pending,
            failure_reason: view.failure_reason,
            failure_message: view.failure_message,
        };
        desired.phase = derive_phase(&desired);
        let (ready, bootstrap_ready) = (desired.ready, desired.bootstrap_ready);
        self.write_status_if_changed(machine, desired).await?;

        if ready && bootstrap_ready {
            debug!("Machine {} is running", key);
            Ok(ReconcileOutcome::Done)
        } else {
            debug!(
                "Machine {}: infrastructure ready={}, bootstrap ready={}, retrying in {}s",
                key,
                ready,
                bootstrap_ready,
                self.settings.external_requeue.as_secs()
            );
            Ok(ReconcileOutcome::RequeueAfter(self.settings.external_requeue))
        }
    }

    async fn reconcile_delete(&self, machine: Machine, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        if !self.reconcile_delete_external(&machine).await? {
            let mut desired = machine.status.clone().unwrap_or_default();
            desired.phase = MachinePhase::Deleting;
            self.write_status_if_changed(machine, desired).await?;
            info!(
                "Machine {}: waiting for provider resources to be deleted, retrying in {}s",
                key,
                self.settings.delete_requeue.as_secs()
            );
            return Ok(ReconcileOutcome::RequeueAfter(self.settings.delete_requeue));
        }

        if machine.has_finalizer(MACHINE_FINALIZER) {
            self.release_finalizer(machine).await?;
            info!("Machine {}: provider resources deleted, finalizer released", key);
        } else {
            debug!("Machine {}: provider resources deleted, finalizer already released", key);
        }
        Ok(ReconcileOutcome::Done)
    }

    /// Write `desired` as the Machine's status unless it already matches
    ///
    /// Returns the Machine as last seen, with a fresh version token if written.
    async fn write_status_if_changed(&self, machine: Machine, desired: MachineStatus) -> Result<Machine, ControllerError> {
        if machine.status.clone().unwrap_or_default() == desired {
            return Ok(machine);
        }
        let mut updated = machine;
        updated.status = Some(desired);
        let name = updated.metadata.name.clone().unwrap_or_default();
        bounded(
            self.settings.request_timeout,
            || format!("update status of Machine {}/{}", updated.namespace_or_default(), name),
            self.store.update_machine_status(&updated),
        )
        .await
    }
}

/// Reject Machines whose references cannot name any object
fn validate_spec(machine: &Machine) -> Result<(), ControllerError> {
    let infra = &machine.spec.infrastructure_ref;
    if !infra.is_complete() {
        return Err(ControllerError::InvalidSpec(format!(
            "infrastructureRef must set apiVersion, kind and name (got {infra})"
        )));
    }
    if let Some(config_ref) = &machine.spec.bootstrap.config_ref {
        if !config_ref.is_complete() {
            return Err(ControllerError::InvalidSpec(format!(
                "bootstrap.configRef must set apiVersion, kind and name (got {config_ref})"
            )));
        }
    }
    Ok(())
}
