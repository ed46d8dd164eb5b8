//! Model gateway port
//!
//! The orchestration loop is the only component that talks to the language
//! model, and it does so exclusively through this port. Concrete gateways
//! (HTTP streaming clients for the various vendors) live outside this
//! engine; they hand over normalized [`ModelTurn`]s and accept normalized
//! tool results.

use async_trait::async_trait;
use switchboard_domain::{ModelTurn, Tool, ToolResultForModel};
use thiserror::Error;

/// Error type for model gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The model endpoint could not be reached or dropped the stream.
    #[error("Model connection failed: {0}")]
    Connection(String),

    /// The model returned something the gateway could not normalize.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// The request was cancelled before the model finished.
    #[error("Model request cancelled")]
    Cancelled,
}

/// Port for driving one conversational turn against a language model.
///
/// A gateway instance carries whatever conversation state the vendor needs
/// (message history, response ids); the loop only sees normalized turns.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Open a turn: send the user request together with the tool catalog
    /// and return the model's first response.
    async fn start_turn(
        &self,
        request: &str,
        tools: &[Tool],
    ) -> Result<ModelTurn, GatewayError>;

    /// Feed tool results back and return the model's next response.
    async fn continue_turn(
        &self,
        results: &[ToolResultForModel],
    ) -> Result<ModelTurn, GatewayError>;
}
