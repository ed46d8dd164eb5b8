//! Provider configuration consumed by the engine.
//!
//! An external configuration collaborator (file loader, host application)
//! produces these in-memory structures; the engine never reads files itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to reach one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a subprocess and speak newline-delimited JSON-RPC on its pipes.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// POST JSON-RPC requests to an endpoint, optionally receiving
    /// server-sent-event streams back.
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

/// Definition of one tool provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier, e.g. `github-mcp`.
    pub id: String,
    /// Human-facing name; its slug prefixes the provider's tool names.
    pub display_name: String,
    pub transport: TransportConfig,
}

impl ProviderConfig {
    pub fn stdio(
        id: impl Into<String>,
        display_name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            transport: TransportConfig::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
        }
    }

    pub fn http(
        id: impl Into<String>,
        display_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            transport: TransportConfig::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
        }
    }
}
