//! DataApi Client Library
//!
//! HTTP client for document-store Data API gateways. Every verb becomes a
//! `POST {apiUrl}/action/{verb}` call, and the gateway's two error encodings
//! are normalized into [`RemoteError`].

mod client;
pub mod pipeline;
pub mod transport;

pub use client::{Client, Interpose};
pub use dataapi_core::models::*;
pub use dataapi_core::{ClientConfig, CoreError};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

/// Normalized non-success response from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
    pub code: Option<String>,
    pub link: Option<String>,
    pub status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Configuration(CoreError),

    #[error("{0}")]
    MissingParameter(CoreError),

    /// Gateway-level failure returned as a JSON error object (auth, path validation)
    #[error("Service error: {} - {}", .0.status, .0.message)]
    Service(RemoteError),

    /// Database-level failure returned as a plaintext string (bad operator, duplicate key)
    #[error("Database error: {} - {}", .0.status, .0.message)]
    Database(RemoteError),

    /// Failure raised by the transport itself, passed through untouched
    #[error(transparent)]
    Transport(anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { .. } => ClientError::Configuration(err),
            CoreError::MissingParameter { .. } => ClientError::MissingParameter(err),
        }
    }
}

impl ClientError {
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ClientError::Service(err) | ClientError::Database(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of a remote failure
    pub fn status(&self) -> Option<u16> {
        self.remote().map(|err| err.status)
    }

    /// Gateway error code, e.g. `InvalidSession`
    pub fn code(&self) -> Option<&str> {
        self.remote().and_then(|err| err.code.as_deref())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_variants() {
        let err: ClientError = CoreError::Configuration {
            missing: vec!["apiKey".to_string()],
        }
        .into();
        assert!(matches!(err, ClientError::Configuration(_)));
        assert!(err.status().is_none());

        let err: ClientError = CoreError::MissingParameter {
            missing: vec!["collection".to_string()],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "One or more request parameters were not set: collection"
        );
    }

    #[test]
    fn test_remote_accessors() {
        let err = ClientError::Service(RemoteError {
            message: "Invalid session".to_string(),
            code: Some("InvalidSession".to_string()),
            link: None,
            status: 401,
        });
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.code(), Some("InvalidSession"));
    }
}
