//! File configuration schema.
//!
//! `switchboard.toml` declares providers, approval rules, and execution
//! parameters. The loader turns it into the in-memory structures the engine
//! consumes; nothing in the engine itself reads files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_domain::{ApprovalRule, ProviderConfig};

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub approval: ApprovalSection,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// `[approval]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalSection {
    #[serde(default)]
    pub rules: Vec<ApprovalRule>,
}

/// `[execution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-request protocol timeout, seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-tool-call timeout, seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Concurrent calls per batch. Absent = unbounded up to batch size.
    #[serde(default)]
    pub fan_out: Option<usize>,
    /// Maximum tool rounds per turn.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_max_rounds() -> usize {
    25
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            fan_out: None,
            max_rounds: default_max_rounds(),
        }
    }
}

impl ExecutionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_domain::{RuleKind, TransportConfig};

    #[test]
    fn parses_full_config_from_toml() {
        let config: FileConfig = toml::from_str(
            r#"
            [[providers]]
            id = "github-mcp"
            display_name = "GitHub MCP"

            [providers.transport]
            type = "stdio"
            command = "github-mcp-server"
            args = ["--stdio"]

            [[providers]]
            id = "tracker"
            display_name = "Tracker"

            [providers.transport]
            type = "http"
            url = "https://tracker.example/rpc"
            headers = { authorization = "Bearer abc" }

            [[approval.rules]]
            pattern = "github_mcp_*"
            scope = "tool"
            kind = "allow"

            [[approval.rules]]
            pattern = "tracker"
            scope = "provider"
            kind = "deny"
            enabled = false

            [execution]
            request_timeout_secs = 10
            call_timeout_secs = 20
            fan_out = 4
            max_rounds = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.providers.len(), 2);
        assert!(matches!(
            config.providers[0].transport,
            TransportConfig::Stdio { .. }
        ));
        match &config.providers[1].transport {
            TransportConfig::Http { url, headers } => {
                assert_eq!(url, "https://tracker.example/rpc");
                assert_eq!(headers["authorization"], "Bearer abc");
            }
            other => panic!("expected http transport, got {:?}", other),
        }

        assert_eq!(config.approval.rules.len(), 2);
        // `enabled` defaults to true when omitted.
        assert!(config.approval.rules[0].enabled);
        assert!(!config.approval.rules[1].enabled);
        assert_eq!(config.approval.rules[1].kind, RuleKind::Deny);

        assert_eq!(config.execution.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.execution.call_timeout(), Duration::from_secs(20));
        assert_eq!(config.execution.fan_out, Some(4));
        assert_eq!(config.execution.max_rounds, 8);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.providers.is_empty());
        assert!(config.approval.rules.is_empty());
        assert_eq!(config.execution.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.execution.call_timeout(), Duration::from_secs(60));
        assert_eq!(config.execution.fan_out, None);
        assert_eq!(config.execution.max_rounds, 25);
    }
}
