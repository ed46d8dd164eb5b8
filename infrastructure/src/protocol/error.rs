//! Error types for the provider protocol client

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur when talking JSON-RPC to a provider.
///
/// `RequestTimeout` is deliberately distinct from `Rpc`: the former means
/// the provider never answered within the bound (retryable), the latter is
/// an answer carrying an error object.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse frame: {error}\nRaw frame: {raw}")]
    Parse { error: String, raw: String },

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Client not initialized")]
    NotInitialized,

    #[error("Connection closed")]
    Closed,
}

impl From<ProtocolError> for switchboard_domain::ProviderError {
    fn from(e: ProtocolError) -> Self {
        use switchboard_domain::ProviderError;
        match e {
            ProtocolError::Transport(t) => ProviderError::Transport(t.to_string()),
            ProtocolError::Serialization(s) => ProviderError::Protocol(s.to_string()),
            ProtocolError::Parse { error, .. } => ProviderError::Protocol(error),
            ProtocolError::Rpc { code, message } => ProviderError::Rpc { code, message },
            ProtocolError::RequestTimeout(m) => ProviderError::RequestTimeout(m),
            ProtocolError::HandshakeFailed(m) => ProviderError::Protocol(m),
            ProtocolError::NotInitialized => ProviderError::NotInitialized,
            ProtocolError::Closed => ProviderError::Closed,
        }
    }
}
