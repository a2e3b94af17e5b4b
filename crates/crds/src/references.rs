//! Kubernetes object references for provider resources
//!
//! Machines point at their infrastructure and bootstrap resources through
//! loosely-typed references. The controller never knows the concrete type of
//! a referenced object; it only knows where to find it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to an arbitrarily-typed resource owned by a provider
///
/// Follows the Kubernetes `ObjectReference` convention:
/// - `apiVersion`: group and version of the referenced resource
///   (e.g., "infrastructure.cluster.x-k8s.io/v1alpha2", or "v1" for the core group)
/// - `kind`: the kind of the referenced resource (e.g., "AWSMachine")
/// - `name`: the name of the referenced resource (required)
/// - `namespace`: the namespace of the referenced resource (optional, defaults
///   to the namespace of the referencing Machine)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referenced resource
    pub api_version: String,

    /// Kind of the referenced resource
    pub kind: String,

    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource (defaults to the Machine's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    /// Create a new reference in the same namespace as the referencing object
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// API group of the referenced resource (empty for the core group)
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// API version without the group prefix
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }

    /// Namespace to look the resource up in, falling back to `default_namespace`
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace)
    }

    /// Whether all identifying fields are filled in
    pub fn is_complete(&self) -> bool {
        !self.api_version.is_empty() && !self.kind.is_empty() && !self.name.is_empty()
    }
}

impl std::fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{} ({})", self.kind, ns, self.name, self.api_version),
            None => write!(f, "{} {} ({})", self.kind, self.name, self.api_version),
        }
    }
}
