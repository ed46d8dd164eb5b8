//! Transport layer — byte-stream channels to tool providers.
//!
//! A [`Transport`] delivers whole JSON-RPC frames as strings: `connect`
//! hands back the incoming-frame channel (fed by a background reader task
//! that solely owns the read side), `send` writes one outgoing frame, and
//! `disconnect` tears the channel down. Two variants exist:
//!
//! - [`StdioTransport`] — spawns a provider subprocess and speaks
//!   newline-delimited JSON on its pipes.
//! - [`HttpTransport`] — POSTs frames to an endpoint, optionally consuming
//!   server-sent-event streams.
//!
//! Transport failures are delivered as `Err` frames on the channel; they
//! fail in-flight requests and move the connection to a disconnected state
//! without crashing the process.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for transport operations.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to send: {0}")]
    Send(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Transport closed")]
    Closed,
}

/// Incoming frames: one `Ok(String)` per received JSON-RPC message, or an
/// `Err` when the connection fails. The channel closing means the transport
/// has shut down.
pub type IncomingFrames = mpsc::UnboundedReceiver<Result<String, TransportError>>;

/// A bidirectional frame channel to one provider.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection and return the incoming-frame channel.
    ///
    /// Establishing a connection says nothing about the provider actually
    /// responding — a silent provider is caught by the protocol client's
    /// request timeout.
    async fn connect(&self) -> Result<IncomingFrames, TransportError>;

    /// Send one JSON-RPC frame (a serialized message, no framing).
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Tear down the connection. Idempotent; never blocks indefinitely.
    async fn disconnect(&self);
}
