//! Controller-specific error types.
//!
//! This module defines error types specific to the Machine Controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use object_store::{InvalidKindEntry, StoreError};
use thiserror::Error;

/// Errors that can occur in the Machine Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store error (conflict, transient failure, rejection)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// A store call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The Machine spec cannot be acted on until it is corrected
    #[error("Invalid Machine spec: {0}")]
    InvalidSpec(String),

    /// A reference names a kind missing from the kind table
    #[error("Unregistered kind: {0}")]
    UnregisteredKind(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether the pass failed because another writer got there first
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }
}

impl From<InvalidKindEntry> for ControllerError {
    fn from(err: InvalidKindEntry) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
