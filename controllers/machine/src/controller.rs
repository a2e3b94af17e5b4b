//! Main controller implementation.
//!
//! Wires the Kubernetes client, the object store adapter, the reconciler and
//! the Machine watcher together.

use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileSettings, Reconciler};
use crate::watcher::Watcher;
use crds::Machine;
use kube::{Api, Client};
use object_store::{KubeObjectStore, ObjectStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Machine lifecycle management.
#[derive(Debug)]
pub struct Controller {
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching Machines.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Machine Controller");

        let kube_client = Client::try_default().await?;

        let machine_api: Api<Machine> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let store: Arc<dyn ObjectStore> = Arc::new(KubeObjectStore::new(kube_client));
        let reconciler = Arc::new(Reconciler::new(
            store,
            config.kinds.clone(),
            ReconcileSettings::from(&config),
        ));

        let watcher = Watcher::new(reconciler, machine_api, &config);
        let machine_watcher = tokio::spawn(watcher.watch_machines());

        Ok(Self { machine_watcher })
    }

    /// Runs until the watcher stops.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Machine Controller running");

        self.machine_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("Machine watcher panicked: {e}")))?
    }
}
