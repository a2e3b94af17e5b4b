//! Object store errors

use thiserror::Error;

/// Errors that can occur when talking to the object store
///
/// A missing object on read is not an error: reads return `Option`. `NotFound`
/// only surfaces when a write targets an object that vanished in between.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object no longer exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write carried a stale version token
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network failure, throttling, or the API server being unavailable
    #[error("Transient store error: {0}")]
    Transient(String),

    /// The API server refused the request for a non-retryable reason
    #[error("Request rejected ({code}): {message}")]
    Rejected {
        /// HTTP status code returned by the API server
        code: u16,
        /// Message returned by the API server
        message: String,
    },

    /// Object could not be encoded for the request
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the failure is a version-token conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_) | Self::NotFound(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => match response.code {
                404 => Self::NotFound(response.message),
                409 => Self::Conflict(response.message),
                429 | 500..=599 => Self::Transient(format!("{} ({})", response.message, response.code)),
                code => Self::Rejected {
                    code,
                    message: response.message,
                },
            },
            // Transport, TLS, and decoding failures: the request may succeed next time
            other => Self::Transient(other.to_string()),
        }
    }
}
