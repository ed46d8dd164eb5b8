//! Configuration loading for the CLI and embedding hosts.

pub mod file_config;
pub mod loader;

pub use file_config::{ApprovalSection, ExecutionConfig, FileConfig};
pub use loader::ConfigLoader;
