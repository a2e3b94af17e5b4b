//! Bootstrap readiness

use super::Reconciler;
use super::external::Resolved;
use super::status::project_bootstrap;
use crate::error::ControllerError;
use crds::Machine;
use tracing::debug;

/// Bootstrap state observed in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BootstrapState {
    /// Whether bootstrap data is available to the Machine
    pub ready: bool,
    /// Data to copy into `spec.bootstrap.data`
    pub data: Option<String>,
}

impl Reconciler {
    /// Work out whether the Machine has its bootstrap data
    ///
    /// Inline data wins. Otherwise the bootstrap resource is consulted and,
    /// once it reports ready with data, that data is handed back for copying
    /// into the Machine spec. A Machine with neither has nothing to wait for.
    pub(crate) async fn reconcile_bootstrap(&self, machine: &Machine) -> Result<BootstrapState, ControllerError> {
        let bootstrap = &machine.spec.bootstrap;
        if bootstrap.data.is_some() {
            return Ok(BootstrapState { ready: true, data: None });
        }
        let Some(config_ref) = &bootstrap.config_ref else {
            return Ok(BootstrapState { ready: true, data: None });
        };

        let object = match self
            .resolver
            .resolve(config_ref, machine.namespace_or_default())
            .await?
        {
            Resolved::Found(object) => object,
            Resolved::NotFound => return Ok(BootstrapState::default()),
        };

        let view = project_bootstrap(&object.data);
        match view.data {
            Some(data) if view.ready => Ok(BootstrapState {
                ready: true,
                data: Some(data),
            }),
            _ => {
                debug!("Bootstrap {} not ready yet", config_ref);
                Ok(BootstrapState::default())
            }
        }
    }
}
