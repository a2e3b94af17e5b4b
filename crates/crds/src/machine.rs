//! Machine CRD
//!
//! Declares a compute node backed by a provider-owned infrastructure resource
//! and, optionally, a provider-owned bootstrap resource.

use crate::references::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer token owned by the machine controller
pub const MACHINE_FINALIZER: &str = "machine.cluster.x-k8s.io";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1alpha2",
    kind = "Machine",
    namespaced,
    status = "MachineStatus",
    shortname = "ma",
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Reference to the infrastructure resource backing this machine
    pub infrastructure_ref: ObjectReference,

    /// Node initialization data, inline or via a bootstrap resource
    #[serde(default)]
    pub bootstrap: Bootstrap,

    /// Provider-assigned identifier, defaulted from the infrastructure resource
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    /// Reference to a provider-specific bootstrap resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,

    /// Bootstrap data, either set by the user or copied from the bootstrap resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Whether the infrastructure resource reports ready
    #[serde(default)]
    pub ready: bool,

    /// Whether bootstrap data is available
    #[serde(default)]
    pub bootstrap_ready: bool,

    /// Addresses reported by the infrastructure resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    /// Last provider identifier observed on the infrastructure resource
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Advisory lifecycle phase
    #[serde(default)]
    pub phase: MachinePhase,

    /// Terminal failure reason reported by the infrastructure provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Human readable failure detail reported by the infrastructure provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

/// A single network address of a machine
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct MachineAddress {
    /// Address type (e.g., "InternalIP", "ExternalDNS")
    #[serde(rename = "type")]
    pub address_type: String,

    /// The address itself
    pub address: String,
}

impl MachineAddress {
    /// Create an address of the given type
    pub fn new(address_type: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address_type: address_type.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Machine lifecycle phase
///
/// Serializes as PascalCase ("Running", "Deleting", etc.) but also accepts
/// lowercase values written by older tooling.
#[serde(rename_all = "PascalCase")]
pub enum MachinePhase {
    /// Waiting for bootstrap data and infrastructure
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Bootstrap data available, infrastructure not ready yet
    #[serde(alias = "provisioning")]
    Provisioning,

    /// Infrastructure and bootstrap are ready
    #[serde(alias = "running")]
    Running,

    /// Deletion requested, provider resources are being torn down
    #[serde(alias = "deleting")]
    Deleting,

    /// The infrastructure provider reported a terminal failure
    #[serde(alias = "failed")]
    Failed,
}

impl Machine {
    /// Whether the store has accepted a delete request for this machine
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether `token` is present in the finalizer set
    pub fn has_finalizer(&self, token: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == token))
    }

    /// Namespace of the machine, "default" when unset
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }
}
