//! Status projection from provider payloads.
//!
//! Provider resources are loosely typed. These functions read the handful of
//! conventional fields the controller cares about and fall back to zero values
//! whenever a field is missing or has an unexpected shape.

use crds::{MachineAddress, MachinePhase, MachineStatus};
use serde_json::Value;

/// What the infrastructure resource reports about the machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfrastructureView {
    pub ready: bool,
    pub addresses: Vec<MachineAddress>,
    pub provider_id: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_message: Option<String>,
}

/// What the bootstrap resource reports about the machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapView {
    pub ready: bool,
    pub data: Option<String>,
}

/// Walk `path` through nested objects
fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |value, key| value.get(key))
}

fn lookup_bool(payload: &Value, path: &[&str]) -> bool {
    lookup(payload, path).and_then(Value::as_bool).unwrap_or(false)
}

/// Non-empty string at `path`
fn lookup_string(payload: &Value, path: &[&str]) -> Option<String> {
    lookup(payload, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn lookup_addresses(payload: &Value) -> Vec<MachineAddress> {
    let Some(entries) = lookup(payload, &["status", "addresses"]).and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let address_type = entry.get("type")?.as_str()?;
            let address = entry.get("address")?.as_str()?;
            Some(MachineAddress::new(address_type, address))
        })
        .collect()
}

/// Project an infrastructure payload into an [`InfrastructureView`]
pub fn project_infrastructure(payload: &Value) -> InfrastructureView {
    InfrastructureView {
        ready: lookup_bool(payload, &["status", "ready"]),
        addresses: lookup_addresses(payload),
        provider_id: lookup_string(payload, &["spec", "providerID"]),
        failure_reason: lookup_string(payload, &["status", "errorReason"]),
        failure_message: lookup_string(payload, &["status", "errorMessage"]),
    }
}

/// Project a bootstrap payload into a [`BootstrapView`]
pub fn project_bootstrap(payload: &Value) -> BootstrapView {
    BootstrapView {
        ready: lookup_bool(payload, &["status", "ready"]),
        data: lookup_string(payload, &["status", "bootstrapData"]),
    }
}

/// Advisory phase of a Machine that is not being deleted
pub fn derive_phase(status: &MachineStatus) -> MachinePhase {
    if status.failure_reason.is_some() || status.failure_message.is_some() {
        MachinePhase::Failed
    } else if status.ready && status.bootstrap_ready {
        MachinePhase::Running
    } else if status.bootstrap_ready {
        MachinePhase::Provisioning
    } else {
        MachinePhase::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_ready_with_addresses() {
        let view = project_infrastructure(&json!({
            "status": {
                "ready": true,
                "addresses": [{ "type": "InternalIP", "address": "10.0.0.1" }],
            },
        }));
        assert!(view.ready);
        assert_eq!(view.addresses, vec![MachineAddress::new("InternalIP", "10.0.0.1")]);
        assert_eq!(view.provider_id, None);
    }

    #[test]
    fn test_project_empty_payload() {
        assert_eq!(project_infrastructure(&json!({})), InfrastructureView::default());
        assert_eq!(project_infrastructure(&Value::Null), InfrastructureView::default());
    }

    #[test]
    fn test_ready_must_be_boolean() {
        for ready in [json!("true"), json!(1), json!(null), json!({})] {
            let view = project_infrastructure(&json!({ "status": { "ready": ready } }));
            assert!(!view.ready);
        }
        // Status that is not an object at all
        assert!(!project_infrastructure(&json!({ "status": "ready" })).ready);
    }

    #[test]
    fn test_malformed_addresses_are_skipped() {
        let view = project_infrastructure(&json!({
            "status": {
                "addresses": [
                    { "type": "InternalIP", "address": "10.0.0.1" },
                    { "type": "ExternalIP" },
                    { "address": "10.0.0.3" },
                    { "type": 4, "address": "10.0.0.4" },
                    "10.0.0.5",
                    { "type": "Hostname", "address": "node-1" },
                ],
            },
        }));
        assert_eq!(
            view.addresses,
            vec![
                MachineAddress::new("InternalIP", "10.0.0.1"),
                MachineAddress::new("Hostname", "node-1"),
            ]
        );

        let not_a_list = project_infrastructure(&json!({ "status": { "addresses": "10.0.0.1" } }));
        assert!(not_a_list.addresses.is_empty());
    }

    #[test]
    fn test_provider_id_and_failure() {
        let view = project_infrastructure(&json!({
            "spec": { "providerID": "test://id-1" },
            "status": { "errorReason": "CreateError", "errorMessage": "quota exceeded" },
        }));
        assert_eq!(view.provider_id.as_deref(), Some("test://id-1"));
        assert_eq!(view.failure_reason.as_deref(), Some("CreateError"));
        assert_eq!(view.failure_message.as_deref(), Some("quota exceeded"));

        let empty = project_infrastructure(&json!({ "spec": { "providerID": "" } }));
        assert_eq!(empty.provider_id, None);
    }

    #[test]
    fn test_project_bootstrap() {
        let view = project_bootstrap(&json!({
            "status": { "ready": true, "bootstrapData": "#cloud-config" },
        }));
        assert!(view.ready);
        assert_eq!(view.data.as_deref(), Some("#cloud-config"));

        let pending = project_bootstrap(&json!({ "status": { "ready": false } }));
        assert_eq!(pending, BootstrapView::default());
    }

    #[test]
    fn test_derive_phase() {
        let mut status = MachineStatus::default();
        assert_eq!(derive_phase(&status), MachinePhase::Pending);

        status.bootstrap_ready = true;
        assert_eq!(derive_phase(&status), MachinePhase::Provisioning);

        status.ready = true;
        assert_eq!(derive_phase(&status), MachinePhase::Running);

        status.failure_reason = Some("CreateError".to_string());
        assert_eq!(derive_phase(&status), MachinePhase::Failed);
    }
}
