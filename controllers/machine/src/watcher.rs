//! Kubernetes resource watcher.
//!
//! Feeds Machine keys to the reconciler through `kube_runtime::Controller`,
//! which single-flights each key, coalesces bursts of events and honours the
//! requeue delay returned by a pass. Failed passes are retried with a
//! per-Machine Fibonacci backoff kept here, outside the reconciler.

use crate::backoff::FibonacciBackoff;
use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::Machine;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use object_store::ObjectKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before retrying a pass that lost an optimistic-concurrency race
const CONFLICT_RETRY: Duration = Duration::from_secs(1);

/// Shared state handed to every reconcile and error-policy call
pub struct Context {
    reconciler: Arc<Reconciler>,
    resync: Duration,
    backoff_min: Duration,
    backoff_max: Duration,
    /// Retry backoff per Machine (namespace/name -> backoff)
    backoff_states: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("resync", &self.resync)
            .field("backoff_min", &self.backoff_min)
            .field("backoff_max", &self.backoff_max)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(reconciler: Arc<Reconciler>, config: &Config) -> Self {
        Self {
            reconciler,
            resync: config.resync,
            backoff_min: config.backoff_min,
            backoff_max: config.backoff_max,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Map a pass outcome to the delivery layer's requeue action
    fn action_for(&self, outcome: ReconcileOutcome) -> Action {
        match outcome {
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
            // Provider resources are not watched; the resync is what notices
            // a settled Machine's infrastructure going away or unready
            ReconcileOutcome::Done => Action::requeue(self.resync),
        }
    }

    /// Delay before retrying a failed pass for `key`
    fn retry_after(&self, key: &ObjectKey, error: &ControllerError) -> Duration {
        if error.is_conflict() {
            return CONFLICT_RETRY;
        }
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(self.backoff_min, self.backoff_max))
            .next_backoff()
    }

    fn reset_backoff(&self, key: &ObjectKey) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

fn key_for(machine: &Machine) -> ObjectKey {
    ObjectKey::new(machine.namespace().unwrap_or_else(|| "default".to_string()), machine.name_any())
}

async fn reconcile(machine: Arc<Machine>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = key_for(&machine);
    debug!("Reconciling Machine {}", key);
    let outcome = ctx.reconciler.reconcile(&key).await?;
    ctx.reset_backoff(&key);
    Ok(ctx.action_for(outcome))
}

fn error_policy(machine: Arc<Machine>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = key_for(&machine);
    let delay = ctx.retry_after(&key, error);
    if error.is_conflict() {
        debug!("Machine {} was modified concurrently, retrying in {}s", key, delay.as_secs());
    } else {
        warn!("Reconciliation error for Machine {}: {} (retrying in {}s)", key, error, delay.as_secs());
    }
    Action::requeue(delay)
}

/// Watches Machines and drives them through the reconciler.
pub struct Watcher {
    api: Api<Machine>,
    context: Arc<Context>,
    debounce: Duration,
    concurrency: u16,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("context", &self.context)
            .field("debounce", &self.debounce)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, api: Api<Machine>, config: &Config) -> Self {
        Self {
            api,
            context: Arc::new(Context::new(reconciler, config)),
            debounce: config.debounce,
            concurrency: config.concurrency,
        }
    }

    /// Watch Machines until the process receives SIGINT or SIGTERM.
    pub async fn watch_machines(self) -> Result<(), ControllerError> {
        info!("Starting Machine watcher");

        let controller_config = ControllerConfig::default()
            .debounce(self.debounce)
            .concurrency(self.concurrency);

        Controller::new(self.api, watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|res| async move {
                match res {
                    Ok((object, _action)) => debug!("Reconciled Machine {}", object),
                    Err(e) => error!("Machine controller error: {}", e),
                }
            })
            .await;

        info!("Machine watcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use object_store::{MockObjectStore, StoreError};

    fn test_context(config: &Config) -> Context {
        let store = MockObjectStore::new();
        Context::new(Arc::new(create_test_reconciler(&store)), config)
    }

    fn default_config() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    fn transient() -> ControllerError {
        ControllerError::Store(StoreError::Transient("connection refused".to_string()))
    }

    #[test]
    fn test_failed_passes_back_off() {
        let ctx = test_context(&default_config());
        let key = machine_key("m");
        let delays: Vec<u64> = (0..4).map(|_| ctx.retry_after(&key, &transient()).as_secs()).collect();
        assert_eq!(delays, vec![5, 5, 10, 15]);

        // Other Machines keep their own backoff
        assert_eq!(ctx.retry_after(&machine_key("other"), &transient()), Duration::from_secs(5));
    }

    #[test]
    fn test_success_resets_backoff() {
        let ctx = test_context(&default_config());
        let key = machine_key("m");
        for _ in 0..3 {
            ctx.retry_after(&key, &transient());
        }
        ctx.reset_backoff(&key);
        assert_eq!(ctx.retry_after(&key, &transient()), Duration::from_secs(5));
    }

    #[test]
    fn test_conflicts_retry_quickly() {
        let ctx = test_context(&default_config());
        let conflict = ControllerError::Store(StoreError::Conflict("stale".to_string()));
        assert_eq!(ctx.retry_after(&machine_key("m"), &conflict), CONFLICT_RETRY);
        // A conflict does not advance the backoff
        assert_eq!(ctx.retry_after(&machine_key("m"), &transient()), Duration::from_secs(5));
    }

    #[test]
    fn test_action_for_outcome() {
        let ctx = test_context(&default_config());
        assert_eq!(
            ctx.action_for(ReconcileOutcome::RequeueAfter(Duration::from_secs(30))),
            Action::requeue(Duration::from_secs(30))
        );

        let mut config = default_config();
        config.resync = Duration::from_secs(600);
        assert_eq!(
            test_context(&config).action_for(ReconcileOutcome::Done),
            Action::requeue(Duration::from_secs(600))
        );
    }

    #[tokio::test]
    async fn test_settled_machine_is_revisited_by_default() {
        let store = MockObjectStore::new();
        store.add_machine(create_test_machine("m"));
        store.add_object(&infra_resource(), "default", "infra-config1", serde_json::json!({
            "status": { "ready": true },
        }));
        let ctx = Context::new(Arc::new(create_test_reconciler(&store)), &default_config());

        let outcome = ctx.reconciler.reconcile(&machine_key("m")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        let action = ctx.action_for(outcome);
        assert_ne!(action, Action::await_change());
        assert_eq!(action, Action::requeue(Duration::from_secs(300)));

        // The scheduled pass picks up the infrastructure turning unready
        store.add_object(&infra_resource(), "default", "infra-config1", serde_json::json!({
            "status": { "ready": false },
        }));
        ctx.reconciler.reconcile(&machine_key("m")).await.unwrap();
        assert!(!store.machine(&machine_key("m")).unwrap().status.unwrap().ready);
    }

    #[test]
    fn test_key_defaults_namespace() {
        let mut machine = create_test_machine("m");
        machine.metadata.namespace = None;
        assert_eq!(key_for(&machine), ObjectKey::new("default", "m"));
    }
}
