//! Provider client abstraction
//!
//! [`ProviderClient`] is the seam between the tool registry and whatever
//! speaks the wire protocol for one provider. The production implementation
//! is the JSON-RPC protocol client in the infrastructure layer; tests plug
//! in scripted fakes.

use async_trait::async_trait;
use serde_json::Map;
use thiserror::Error;

use super::schema::ToolSchema;
use super::value_objects::ToolContent;

/// Error type for provider operations.
///
/// Transport and protocol failures are fatal to the provider connection but
/// isolated from other providers. A request timeout resolves only the call
/// that timed out and is retryable.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection-level failure (broken pipe, refused, TLS).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Malformed frame, handshake mismatch, unknown method.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response for a request within the configured bound.
    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    /// Provider returned a JSON-RPC error object.
    #[error("Provider error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// RPC attempted before the handshake completed.
    #[error("Provider not initialized")]
    NotInitialized,

    /// The connection has been closed.
    #[error("Provider connection closed")]
    Closed,
}

impl ProviderError {
    /// Whether retrying the same call later could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RequestTimeout(_))
    }
}

/// A tool as reported by a provider's discovery listing, before the registry
/// assigns it a disambiguated name.
#[derive(Debug, Clone)]
pub struct DiscoveredTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: ToolSchema,
}

/// Output of one provider tool invocation.
///
/// `is_error` mirrors the provider's own error flag: the call completed at
/// the wire level but the tool reported failure. It is surfaced as an error
/// outcome downstream, never as a transport failure.
#[derive(Debug, Clone)]
pub struct ProviderCallOutput {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
    /// Provider hint that the failure is transient. Absent means not
    /// retryable.
    pub retryable_hint: Option<bool>,
}

impl ProviderCallOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
            retryable_hint: None,
        }
    }
}

/// Client for one connected tool provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider id this client is connected to.
    fn provider_id(&self) -> &str;

    /// Discover the provider's tools.
    async fn list_tools(&self) -> Result<Vec<DiscoveredTool>, ProviderError>;

    /// Invoke a tool by its provider-local (original) name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, serde_json::Value>,
    ) -> Result<ProviderCallOutput, ProviderError>;

    /// Close the connection, releasing the underlying transport.
    async fn close(&self);
}
