//! Infrastructure layer for switchboard
//!
//! Adapters around the domain and application layers: the two provider
//! transports (subprocess stdio, HTTP/SSE), the JSON-RPC protocol client,
//! the tool registry, the vendor schema translators, and the configuration
//! loader.

pub mod config;
pub mod protocol;
pub mod registry;
pub mod translate;
pub mod transport;

// Re-export commonly used types
pub use config::{ConfigLoader, ExecutionConfig, FileConfig};
pub use protocol::{ClientState, ProtocolClient, ProtocolError};
pub use registry::{RegistryError, RegistryStats, ToolRegistry};
pub use translate::{TranslateError, Vendor, parse_vendor_call, to_vendor_format};
pub use transport::{HttpTransport, StdioTransport, Transport, TransportError};
