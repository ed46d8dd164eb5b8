//! Tool Registry
//!
//! Aggregates tools discovered from all connected providers under
//! disambiguated names, routes calls back to the owning provider, and keeps
//! providers strictly isolated: disconnecting one removes exactly its tools
//! and nothing else.
//!
//! # Naming
//!
//! Every tool is indexed by `slug(provider_display_name) + "_" +
//! original_name`. When two providers' prefixes collide on the same tool
//! name, the later registration is further qualified with the provider id;
//! if even that collides — or one provider lists the same tool twice — the
//! whole registration is rejected and none of that provider's tools are
//! added.
//!
//! # Concurrency
//!
//! Connect/disconnect are serialized per provider id and run concurrently
//! across distinct providers. Discovery happens off-lock; the index is
//! swapped in under a short write lock. Lookup is O(1).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use switchboard_application::ToolInvoker;
use switchboard_domain::{
    ProviderClient, ProviderConfig, ProviderError, Tool, ToolCall, ToolContent, ToolOutcome,
    TransportConfig,
};

use crate::protocol::ProtocolClient;
use crate::transport::{HttpTransport, StdioTransport, Transport};

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Provider already connected: {0}")]
    AlreadyConnected(String),

    #[error("Provider {provider} discovery failed: {source}")]
    Discovery {
        provider: String,
        source: ProviderError,
    },

    #[error("Provider {provider} lists tool `{name}` more than once")]
    DuplicateTool { provider: String, name: String },

    #[error("Tool name collision on `{name}` could not be resolved")]
    NameCollision { name: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

struct ProviderHandle {
    display_name: String,
    client: Arc<dyn ProviderClient>,
}

#[derive(Default)]
struct RegistryInner {
    providers: HashMap<String, ProviderHandle>,
    /// Disambiguated name → tool. The O(1) lookup path.
    by_name: HashMap<String, Tool>,
    /// `(provider_id, original_name)` → disambiguated name.
    identity: HashMap<(String, String), String>,
}

/// Statistics about the registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_providers: usize,
    pub total_tools: usize,
    pub tools_per_provider: HashMap<String, usize>,
}

/// Registry of all connected providers' tools.
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
    /// Per-provider connect/disconnect serialization.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    request_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            locks: Mutex::new(HashMap::new()),
            request_timeout: crate::protocol::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Timeout applied to providers connected via
    /// [`connect`](Self::connect).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Connect a provider from its configuration: build the transport,
    /// run the protocol handshake, then register its tools.
    pub async fn connect(&self, config: &ProviderConfig) -> Result<Vec<Tool>, RegistryError> {
        let transport: Arc<dyn Transport> = match &config.transport {
            TransportConfig::Stdio { command, args, env } => Arc::new(
                StdioTransport::new(command.clone(), args.clone()).with_env(env.clone()),
            ),
            TransportConfig::Http { url, headers } => Arc::new(HttpTransport::new(
                url.clone(),
                headers.clone().into_iter().collect(),
            )),
        };
        let client = Arc::new(
            ProtocolClient::new(&config.id, transport).with_request_timeout(self.request_timeout),
        );
        if let Err(e) = client.initialize().await {
            return Err(RegistryError::Discovery {
                provider: config.id.clone(),
                source: e.into(),
            });
        }
        self.register(&config.display_name, client).await
    }

    /// Register an already-initialized provider client.
    ///
    /// Discovers its tools, computes disambiguated names, and adds them to
    /// the index. All-or-nothing: a naming conflict registers none of the
    /// provider's tools.
    pub async fn register(
        &self,
        display_name: &str,
        client: Arc<dyn ProviderClient>,
    ) -> Result<Vec<Tool>, RegistryError> {
        let provider_id = client.provider_id().to_string();
        let lock = self.provider_lock(&provider_id);
        let _guard = lock.lock().await;

        if self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .contains_key(&provider_id)
        {
            return Err(RegistryError::AlreadyConnected(provider_id));
        }

        let discovered =
            client
                .list_tools()
                .await
                .map_err(|source| RegistryError::Discovery {
                    provider: provider_id.clone(),
                    source,
                })?;

        let mut batch: Vec<Tool> = Vec::with_capacity(discovered.len());
        for tool in discovered {
            if batch.iter().any(|t| t.original_name == tool.name) {
                return Err(RegistryError::DuplicateTool {
                    provider: provider_id,
                    name: tool.name,
                });
            }
            batch.push(Tool::new(
                &provider_id,
                display_name,
                tool.name,
                tool.description,
                tool.input_schema,
            ));
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Qualify cross-provider collisions, then verify uniqueness.
        let batch: Vec<Tool> = batch
            .into_iter()
            .map(|tool| {
                if inner.by_name.contains_key(&tool.name) {
                    let qualified = tool.qualified_with_provider_id();
                    debug!(
                        provider = %provider_id,
                        name = %qualified.name,
                        "Qualified colliding tool name"
                    );
                    qualified
                } else {
                    tool
                }
            })
            .collect();
        let mut batch_names = std::collections::HashSet::new();
        for tool in &batch {
            if inner.by_name.contains_key(&tool.name) || !batch_names.insert(tool.name.as_str()) {
                warn!(provider = %provider_id, name = %tool.name, "Unresolvable name collision");
                return Err(RegistryError::NameCollision {
                    name: tool.name.clone(),
                });
            }
        }

        for tool in &batch {
            inner.by_name.insert(tool.name.clone(), tool.clone());
            inner.identity.insert(
                (tool.provider_id.clone(), tool.original_name.clone()),
                tool.name.clone(),
            );
        }
        inner.providers.insert(
            provider_id.clone(),
            ProviderHandle {
                display_name: display_name.to_string(),
                client,
            },
        );
        info!(provider = %provider_id, tools = batch.len(), "Provider registered");
        Ok(batch)
    }

    /// Disconnect a provider, removing exactly its tools.
    pub async fn disconnect(&self, provider_id: &str) -> Result<(), RegistryError> {
        let lock = self.provider_lock(provider_id);
        let _guard = lock.lock().await;

        let handle = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let handle = inner
                .providers
                .remove(provider_id)
                .ok_or_else(|| RegistryError::UnknownProvider(provider_id.to_string()))?;
            inner.by_name.retain(|_, tool| tool.provider_id != provider_id);
            inner.identity.retain(|(owner, _), _| owner != provider_id);
            handle
        };
        handle.client.close().await;
        info!(provider = %provider_id, "Provider disconnected");
        Ok(())
    }

    /// Disconnect every provider (shutdown path).
    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner.providers.keys().cloned().collect()
        };
        for id in ids {
            let _ = self.disconnect(&id).await;
        }
    }

    /// Get a tool by its disambiguated name.
    pub fn get(&self, name: &str) -> Option<Tool> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_name
            .get(name)
            .cloned()
    }

    /// Get a tool by its provider-local identity.
    pub fn get_by_identity(&self, provider_id: &str, original_name: &str) -> Option<Tool> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let name = inner
            .identity
            .get(&(provider_id.to_string(), original_name.to_string()))?;
        inner.by_name.get(name).cloned()
    }

    /// All tools, grouped by provider id. Used for provider-scoped approval
    /// rule displays.
    pub fn tools_by_provider(&self) -> HashMap<String, Vec<Tool>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut grouped: HashMap<String, Vec<Tool>> = HashMap::new();
        for tool in inner.by_name.values() {
            grouped
                .entry(tool.provider_id.clone())
                .or_default()
                .push(tool.clone());
        }
        for tools in grouped.values_mut() {
            tools.sort_by(|a, b| a.name.cmp(&b.name));
        }
        grouped
    }

    /// Display name of a connected provider.
    pub fn provider_display_name(&self, provider_id: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .get(provider_id)
            .map(|h| h.display_name.clone())
    }

    /// Ids of all connected providers.
    pub fn provider_ids(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = inner.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get statistics about registered tools
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut tools_per_provider = HashMap::new();
        for tool in inner.by_name.values() {
            *tools_per_provider
                .entry(tool.provider_id.clone())
                .or_insert(0) += 1;
        }
        RegistryStats {
            total_providers: inner.providers.len(),
            total_tools: inner.by_name.len(),
            tools_per_provider,
        }
    }

    fn provider_lock(&self, provider_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(provider_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn client_for(&self, provider_id: &str) -> Option<Arc<dyn ProviderClient>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .get(provider_id)
            .map(|h| Arc::clone(&h.client))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn render_error_content(content: &[ToolContent]) -> String {
    let text = content
        .iter()
        .map(ToolContent::as_model_text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        "tool reported an error".to_string()
    } else {
        text
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    fn lookup(&self, disambiguated_name: &str) -> Option<Tool> {
        self.get(disambiguated_name)
    }

    fn catalog(&self) -> Vec<Tool> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut tools: Vec<Tool> = inner.by_name.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        // Validate against the live index: the provider may have gone away
        // between resolution and dispatch.
        if self.get(&call.name).is_none() {
            return ToolOutcome::Error {
                message: format!("tool `{}` is no longer registered", call.name),
                code: Some("tool_not_found".to_string()),
                retryable: false,
            };
        }
        let Some(client) = self.client_for(&call.provider_id) else {
            return ToolOutcome::Error {
                message: format!("provider `{}` is not connected", call.provider_id),
                code: Some("provider_disconnected".to_string()),
                retryable: false,
            };
        };

        match client.call_tool(&call.original_name, &call.arguments).await {
            Ok(output) if output.is_error => ToolOutcome::Error {
                message: render_error_content(&output.content),
                code: Some("tool_error".to_string()),
                retryable: output.retryable_hint.unwrap_or(false),
            },
            Ok(output) => ToolOutcome::Success {
                content: output.content,
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Provider call failed");
                let code = match &e {
                    ProviderError::RequestTimeout(_) => "timeout",
                    ProviderError::Transport(_) => "transport",
                    ProviderError::Rpc { .. } => "rpc_error",
                    _ => "protocol",
                };
                ToolOutcome::Error {
                    message: e.to_string(),
                    code: Some(code.to_string()),
                    retryable: e.is_retryable(),
                }
            }
        }
    }
}
