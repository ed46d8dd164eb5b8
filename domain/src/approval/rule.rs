//! Approval rule value objects
//!
//! Rules are pattern-based policies that resolve approval without user
//! interaction. They arrive from an external configuration collaborator;
//! the gate only evaluates them. Deny always beats allow.

use serde::{Deserialize, Serialize};

/// What a rule's pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Match the disambiguated tool name.
    Tool,
    /// Match the provider id — the rule covers every tool of matching
    /// providers.
    Provider,
}

/// Whether a matching rule clears or blocks the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Allow,
    Deny,
}

/// A single approval rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Glob pattern, e.g. `github_mcp_*` or `jira-*`.
    pub pattern: String,
    pub scope: RuleScope,
    pub kind: RuleKind,
    /// Disabled rules are kept for display but never match.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ApprovalRule {
    pub fn allow_tool(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: RuleScope::Tool,
            kind: RuleKind::Allow,
            enabled: true,
        }
    }

    pub fn deny_tool(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: RuleScope::Tool,
            kind: RuleKind::Deny,
            enabled: true,
        }
    }

    pub fn allow_provider(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: RuleScope::Provider,
            kind: RuleKind::Allow,
            enabled: true,
        }
    }

    pub fn deny_provider(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: RuleScope::Provider,
            kind: RuleKind::Deny,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_deny(&self) -> bool {
        self.kind == RuleKind::Deny
    }
}
