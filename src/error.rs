//! Error types for the admission core

use thiserror::Error;

/// Main error type for admission operations
///
/// Every variant eventually surfaces to the API gateway as an admission
/// rejection (`allowed=false`) carrying the error message verbatim.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for submitted manifests
    #[error("validation error: {0}")]
    Validation(String),

    /// A scarce resource (VNI, eligible device) ran out
    #[error("resource exhausted: {0}")]
    Exhausted(String),

    /// CRD client error outside the kube transport itself
    #[error("client error: {0}")]
    Client(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a resource-exhaustion error with the given message
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::Exhausted(msg.into())
    }

    /// Create a client error with the given message
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
