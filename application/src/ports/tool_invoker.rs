//! Tool invoker port
//!
//! Defines how the application layer looks up and invokes tools. The
//! infrastructure tool registry is the production adapter; tests use
//! scripted fakes.

use async_trait::async_trait;
use switchboard_domain::{Tool, ToolCall, ToolOutcome};

/// Port for tool lookup and invocation.
///
/// `invoke` returns a [`ToolOutcome`], never an error: transport failures,
/// provider-reported errors, and unknown tools are all data by the time they
/// cross this boundary.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// O(1) lookup by disambiguated name.
    fn lookup(&self, disambiguated_name: &str) -> Option<Tool>;

    /// All registered tools, for handing the catalog to the model.
    fn catalog(&self) -> Vec<Tool>;

    /// Check if a tool is available
    fn has_tool(&self, disambiguated_name: &str) -> bool {
        self.lookup(disambiguated_name).is_some()
    }

    /// Dispatch one call to its provider and return the outcome.
    async fn invoke(&self, call: &ToolCall) -> ToolOutcome;
}
