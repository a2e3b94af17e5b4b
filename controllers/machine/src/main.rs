//! Machine Controller
//!
//! Drives `Machine` resources toward their declared state by orchestrating
//! two provider-owned resources:
//! - the infrastructure resource backing the node
//! - the optional bootstrap resource holding node initialization data
//!
//! The controller keeps a finalizer on every Machine so that both provider
//! resources are deleted before the Machine itself disappears.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls feature needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Machine Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Provider kinds: {}", config.kinds.len());
    info!("  External requeue: {}s", config.external_requeue.as_secs());
    info!("  Delete requeue: {}s", config.delete_requeue.as_secs());
    info!("  Request timeout: {}s", config.request_timeout.as_secs());
    info!("  Concurrency: {}", config.concurrency);
    info!("  Resync: {}s", config.resync.as_secs());

    let controller = Controller::new(config).await?;
    controller.run().await?;

    info!("Machine Controller stopped");
    Ok(())
}
