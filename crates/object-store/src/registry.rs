//! Explicit kind lookup table
//!
//! Maps (API group, kind) pairs to the REST resource name used to address
//! them. The table is built once at startup and handed to whoever needs to
//! address loosely-typed resources; there is no process-wide registry.

use crds::ObjectReference;
use kube::discovery::ApiResource;
use std::collections::HashMap;
use thiserror::Error;

/// Provider kinds known out of the box: (API group, kind, plural)
const BUILTIN_KINDS: &[(&str, &str, &str)] = &[
    ("infrastructure.cluster.x-k8s.io", "AWSMachine", "awsmachines"),
    ("infrastructure.cluster.x-k8s.io", "AzureMachine", "azuremachines"),
    ("infrastructure.cluster.x-k8s.io", "DockerMachine", "dockermachines"),
    ("infrastructure.cluster.x-k8s.io", "GCPMachine", "gcpmachines"),
    ("infrastructure.cluster.x-k8s.io", "VSphereMachine", "vspheremachines"),
    ("bootstrap.cluster.x-k8s.io", "KubeadmConfig", "kubeadmconfigs"),
];

/// A malformed `apiVersion/Kind[=plural]` entry
#[derive(Debug, Error)]
#[error("invalid kind entry '{0}': expected apiVersion/Kind[=plural]")]
pub struct InvalidKindEntry(pub String);

/// Lookup table from (group, kind) to REST plural
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    plurals: HashMap<(String, String), String>,
}

impl KindRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in provider kinds
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        for (group, kind, plural) in BUILTIN_KINDS {
            registry.register(group, kind, plural);
        }
        registry
    }

    /// Register a kind under its API group
    pub fn register(&mut self, group: &str, kind: &str, plural: &str) {
        self.plurals
            .insert((group.to_string(), kind.to_string()), plural.to_string());
    }

    /// Builder-style variant of [`KindRegistry::register`]
    #[must_use]
    pub fn with_kind(mut self, group: &str, kind: &str, plural: &str) -> Self {
        self.register(group, kind, plural);
        self
    }

    /// Register entries of the form `apiVersion/Kind[=plural]`, comma-separated
    ///
    /// The version part of `apiVersion` is ignored: references carry their
    /// own version. A missing plural is derived from the kind.
    pub fn register_entries(&mut self, entries: &str) -> Result<(), InvalidKindEntry> {
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (path, plural) = match entry.split_once('=') {
                Some((path, plural)) => (path, Some(plural.trim())),
                None => (entry, None),
            };
            let (api_version, kind) = path
                .rsplit_once('/')
                .ok_or_else(|| InvalidKindEntry(entry.to_string()))?;
            if api_version.is_empty() || kind.is_empty() || plural.is_some_and(str::is_empty) {
                return Err(InvalidKindEntry(entry.to_string()));
            }
            let group = api_version.split_once('/').map_or("", |(group, _)| group);
            let plural = plural.map_or_else(|| pluralize_kind(kind), str::to_string);
            self.register(group, kind, &plural);
        }
        Ok(())
    }

    /// Resolve the `ApiResource` for a reference, or `None` if its kind is unknown
    ///
    /// The returned resource uses the version named by the reference.
    pub fn api_resource(&self, reference: &ObjectReference) -> Option<ApiResource> {
        let key = (reference.group().to_string(), reference.kind.clone());
        self.plurals.get(&key).map(|plural| ApiResource {
            group: reference.group().to_string(),
            version: reference.version().to_string(),
            api_version: reference.api_version.clone(),
            kind: reference.kind.clone(),
            plural: plural.clone(),
        })
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.plurals.len()
    }

    /// Whether no kinds are registered
    pub fn is_empty(&self) -> bool {
        self.plurals.is_empty()
    }
}

/// Derive the REST plural of a kind using Kubernetes naming conventions
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{lower}es")
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        // policy -> policies, but not gateway -> gateways
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{lower}s")
    }
}
