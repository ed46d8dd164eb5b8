//! Domain layer for switchboard
//!
//! This crate contains the core entities and value objects of the
//! tool-invocation engine. It has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Disambiguated names
//!
//! Tools from different providers may share a name. The registry-facing
//! identity of every tool is its disambiguated name — the slugged provider
//! display name plus the original tool name — unique across one registry.
//!
//! ## Results are values
//!
//! Every tool call ends in exactly one [`ToolResult`], whether it executed,
//! failed, timed out, or was denied by the user. Nothing in this layer
//! panics on a tool-level failure.

pub mod approval;
pub mod config;
pub mod core;
pub mod orchestration;
pub mod tool;

// Re-export commonly used types
pub use approval::{
    rule::{ApprovalRule, RuleKind, RuleScope},
    value_objects::{ApprovalAction, ApprovalDecision, SessionApprovalMemory},
};
pub use config::{ProviderConfig, TransportConfig};
pub use crate::core::slug::slug;
pub use orchestration::entities::{
    ExecutionRound, ModelTurn, RequestedCall, ToolResultForModel, TurnPhase,
};
pub use tool::{
    entities::{Tool, ToolCall, disambiguated_name},
    provider::{DiscoveredTool, ProviderCallOutput, ProviderClient, ProviderError},
    schema::ToolSchema,
    value_objects::{ToolContent, ToolOutcome, ToolResult},
};
