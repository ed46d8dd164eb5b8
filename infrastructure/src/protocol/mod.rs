//! Provider protocol: JSON-RPC client, message types, and errors.

pub mod client;
pub mod error;
pub mod messages;

pub use client::{ClientState, DEFAULT_REQUEST_TIMEOUT, ProtocolClient};
pub use error::ProtocolError;
