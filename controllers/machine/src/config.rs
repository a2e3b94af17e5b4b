//! Controller configuration.
//!
//! All settings come from environment variables and are read once at startup.
//! Parsing goes through a lookup function so it can be tested without
//! touching the process environment.

use crate::error::ControllerError;
use object_store::KindRegistry;
use std::env;
use std::time::Duration;

/// Runtime configuration for the Machine Controller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Kind table used to address provider resources
    pub kinds: KindRegistry,
    /// Requeue delay while provider resources are missing or not ready
    pub external_requeue: Duration,
    /// Requeue delay while provider resources are being torn down
    pub delete_requeue: Duration,
    /// Deadline for every individual store call
    pub request_timeout: Duration,
    /// Maximum number of Machines reconciled concurrently
    pub concurrency: u16,
    /// Quiet period before a burst of events triggers a reconcile
    pub debounce: Duration,
    /// Periodic re-reconcile of settled Machines, so provider changes are seen
    pub resync: Duration,
    /// Smallest retry delay after a failed pass
    pub backoff_min: Duration,
    /// Largest retry delay after repeated failed passes
    pub backoff_max: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let mut kinds = KindRegistry::with_builtin_kinds();
        if let Some(entries) = lookup("EXTERNAL_KINDS") {
            kinds.register_entries(&entries)?;
        }

        let concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                ControllerError::InvalidConfig(format!("RECONCILE_CONCURRENCY '{raw}': {e}"))
            })?,
            None => 4,
        };
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let config = Self {
            namespace,
            kinds,
            external_requeue: seconds(&lookup, "EXTERNAL_REQUEUE_SECS", 30)?,
            delete_requeue: seconds(&lookup, "DELETE_REQUEUE_SECS", 10)?,
            request_timeout: seconds(&lookup, "REQUEST_TIMEOUT_SECS", 10)?,
            concurrency,
            debounce: seconds(&lookup, "DEBOUNCE_SECS", 1)?,
            resync: seconds(&lookup, "RESYNC_SECS", 300)?,
            backoff_min: seconds(&lookup, "BACKOFF_MIN_SECS", 5)?,
            backoff_max: seconds(&lookup, "BACKOFF_MAX_SECS", 300)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ControllerError> {
        for (name, value) in [
            ("EXTERNAL_REQUEUE_SECS", self.external_requeue),
            ("DELETE_REQUEUE_SECS", self.delete_requeue),
            ("REQUEST_TIMEOUT_SECS", self.request_timeout),
            ("RESYNC_SECS", self.resync),
            ("BACKOFF_MIN_SECS", self.backoff_min),
        ] {
            if value.is_zero() {
                return Err(ControllerError::InvalidConfig(format!("{name} must be greater than 0")));
            }
        }
        if self.backoff_min > self.backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({}) exceeds BACKOFF_MAX_SECS ({})",
                self.backoff_min.as_secs(),
                self.backoff_max.as_secs()
            )));
        }
        Ok(())
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ControllerError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ControllerError::InvalidConfig(format!("{key} '{raw}': {e}"))),
        None => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.external_requeue, Duration::from_secs(30));
        assert_eq!(config.delete_requeue, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.resync, Duration::from_secs(300));
        assert!(!config.kinds.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WATCH_NAMESPACE", "machines"),
            ("EXTERNAL_REQUEUE_SECS", "5"),
            ("RESYNC_SECS", "600"),
            ("RECONCILE_CONCURRENCY", "16"),
            ("EXTERNAL_KINDS", "infrastructure.cluster.x-k8s.io/v1alpha2/InfrastructureConfig"),
        ])
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("machines"));
        assert_eq!(config.external_requeue, Duration::from_secs(5));
        assert_eq!(config.resync, Duration::from_secs(600));
        assert_eq!(config.concurrency, 16);
        let reference = crds::ObjectReference::new(
            "infrastructure.cluster.x-k8s.io/v1alpha2",
            "InfrastructureConfig",
            "infra-config1",
        );
        assert!(config.kinds.api_resource(&reference).is_some());
    }

    #[test]
    fn test_blank_namespace_means_all() {
        let config = config_from(&[("WATCH_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        assert!(matches!(
            config_from(&[("REQUEST_TIMEOUT_SECS", "ten")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("REQUEST_TIMEOUT_SECS", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("RESYNC_SECS", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("RECONCILE_CONCURRENCY", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_backoff_range() {
        let result = config_from(&[("BACKOFF_MIN_SECS", "60"), ("BACKOFF_MAX_SECS", "30")]);
        assert!(matches!(result, Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_malformed_kind_entry() {
        let result = config_from(&[("EXTERNAL_KINDS", "NotAnEntry")]);
        assert!(matches!(result, Err(ControllerError::InvalidConfig(_))));
    }
}
