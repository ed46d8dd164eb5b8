//! CLI entrypoint for switchboard
//!
//! A thin diagnostic surface over the engine: connect the providers from a
//! config file, inspect their tools, dump vendor-format schemas, or run a
//! single gated call. The conversational loop itself is driven by embedding
//! hosts, not this binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use switchboard_application::{ApprovalGate, Executor, NoApprovalPrompt, ToolInvoker};
use switchboard_domain::{ApprovalRule, SessionApprovalMemory, ToolCall};
use switchboard_infrastructure::{ConfigLoader, FileConfig, ToolRegistry, Vendor, to_vendor_format};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Tool-invocation orchestration engine")]
struct Cli {
    /// Path to switchboard.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect all configured providers and list their tools
    Tools,
    /// Dump the tool catalog in a vendor's function-calling format
    Schema {
        /// anthropic | openai | gemini
        #[arg(long)]
        vendor: Vendor,
    },
    /// Run a single tool call through the gate and executor
    Call {
        /// Disambiguated tool name, e.g. github_mcp_search_issues
        name: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
    if config.providers.is_empty() {
        bail!("no providers configured; add [[providers]] entries to switchboard.toml");
    }

    let registry = Arc::new(
        ToolRegistry::new().with_request_timeout(config.execution.request_timeout()),
    );
    connect_all(&registry, &config).await;

    let result = match cli.command {
        Command::Tools => run_tools(&registry),
        Command::Schema { vendor } => run_schema(&registry, vendor),
        Command::Call { name, args } => run_call(&registry, &config, &name, &args).await,
    };

    registry.disconnect_all().await;
    result
}

async fn connect_all(registry: &Arc<ToolRegistry>, config: &FileConfig) {
    for provider in &config.providers {
        match registry.connect(provider).await {
            Ok(tools) => info!(provider = %provider.id, tools = tools.len(), "Connected"),
            Err(e) => eprintln!("warning: provider {} unavailable: {}", provider.id, e),
        }
    }
}

fn run_tools(registry: &ToolRegistry) -> Result<()> {
    let grouped = registry.tools_by_provider();
    if grouped.is_empty() {
        bail!("no tools discovered from any provider");
    }

    let mut providers: Vec<_> = grouped.keys().cloned().collect();
    providers.sort();
    for provider_id in providers {
        let display = registry
            .provider_display_name(&provider_id)
            .unwrap_or_else(|| provider_id.clone());
        println!("{} ({})", display, provider_id);
        for tool in &grouped[&provider_id] {
            match &tool.description {
                Some(description) => println!("  {} - {}", tool.name, description),
                None => println!("  {}", tool.name),
            }
        }
    }
    Ok(())
}

fn run_schema(registry: &ToolRegistry, vendor: Vendor) -> Result<()> {
    let catalog = registry.catalog();
    let formatted = to_vendor_format(vendor, &catalog);
    println!("{}", serde_json::to_string_pretty(&formatted)?);
    Ok(())
}

async fn run_call(
    registry: &Arc<ToolRegistry>,
    config: &FileConfig,
    name: &str,
    args: &str,
) -> Result<()> {
    let tool = registry
        .get(name)
        .with_context(|| format!("no tool named `{}` is registered", name))?;
    let arguments = match serde_json::from_str(args).context("`--args` must be a JSON object")? {
        serde_json::Value::Object(map) => map,
        _ => bail!("`--args` must be a JSON object"),
    };
    let call = ToolCall::new("cli-call-1", &tool, arguments);

    // Diagnostic one-shot: everything is auto-approved, but it still flows
    // through the gate so the audit log reflects the call.
    let gate = ApprovalGate::new(Arc::new(NoApprovalPrompt));
    let mut memory = SessionApprovalMemory::new("cli");
    let rules = vec![ApprovalRule::allow_tool("*")];
    let cancel = CancellationToken::new();
    let verdict = gate
        .request_approval(vec![call], &mut memory, &rules, &cancel)
        .await;

    let invoker: Arc<dyn ToolInvoker> = Arc::clone(registry) as Arc<dyn ToolInvoker>;
    let executor = Executor::new(invoker)
        .with_call_timeout(config.execution.call_timeout())
        .with_fan_out(config.execution.fan_out);
    let results = executor.execute(verdict.approved, &cancel).await;

    for result in &results {
        println!("{}", result.model_text());
        info!(
            tool = %result.tool_name,
            duration_ms = result.duration_ms,
            success = result.is_success(),
            "Call finished"
        );
    }
    if results.iter().any(|r| !r.is_success()) {
        bail!("tool call failed");
    }
    Ok(())
}
