//! Provider protocol client.
//!
//! Frames and correlates JSON-RPC messages over a [`Transport`], runs the
//! capability handshake, and exposes the typed RPCs the engine needs:
//! `tools/list` and `tools/call`.
//!
//! # State machine
//!
//! `Uninitialized → Initializing → Ready → Closed`, with `Disconnected`
//! entered from anywhere on transport failure. RPCs before `Ready` fail
//! immediately with [`ProtocolError::NotInitialized`].
//!
//! # Correlation
//!
//! Request ids come from a per-client monotonic counter. Each in-flight
//! request parks a `oneshot` sender in the pending map; the background
//! reader task fulfils it when the matching response arrives. A request
//! with no response within the configured bound resolves with
//! [`ProtocolError::RequestTimeout`] and its map entry is removed — other
//! in-flight calls are untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use switchboard_domain::{
    DiscoveredTool, ProviderCallOutput, ProviderClient, ProviderError, ToolSchema,
};

use super::error::{ProtocolError, Result};
use super::messages::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, MessageKind, classify_message, methods,
};
use crate::transport::Transport;

/// Default bound for one request/response round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state of a protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Initializing,
    Ready,
    Disconnected,
    Closed,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<serde_json::Value>>>>>;

/// JSON-RPC client for one provider connection.
pub struct ProtocolClient {
    provider_id: String,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ClientState>>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    server_name: Mutex<Option<String>>,
}

impl ProtocolClient {
    pub fn new(provider_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            provider_id: provider_id.into(),
            transport,
            state: Arc::new(Mutex::new(ClientState::Uninitialized)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            server_name: Mutex::new(None),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Name the provider reported in the handshake, if any.
    pub fn server_name(&self) -> Option<String> {
        self.server_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Connect the transport and run the handshake.
    ///
    /// Issues `initialize`, awaits the capability response, then emits the
    /// `notifications/initialized` notification. Only after that do
    /// [`list_tools`](Self::list_tools) and [`call_tool`](Self::call_tool)
    /// accept calls.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != ClientState::Uninitialized {
                return Err(ProtocolError::HandshakeFailed(format!(
                    "initialize called in state {:?}",
                    *state
                )));
            }
            *state = ClientState::Initializing;
        }

        let frames = match self.transport.connect().await {
            Ok(frames) => frames,
            Err(e) => {
                self.set_state(ClientState::Disconnected);
                return Err(e.into());
            }
        };
        self.spawn_reader(frames);

        let params = serde_json::to_value(InitializeParams::current())?;
        let result = match self.raw_request(methods::INITIALIZE, Some(params)).await {
            Ok(value) => value,
            Err(e) => {
                self.set_state(ClientState::Disconnected);
                return Err(e);
            }
        };
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            self.set_state(ClientState::Disconnected);
            ProtocolError::HandshakeFailed(format!("malformed initialize result: {}", e))
        })?;

        let notification = JsonRpcNotification::new(methods::INITIALIZED, None);
        if let Err(e) = self
            .transport
            .send(&serde_json::to_string(&notification)?)
            .await
        {
            self.set_state(ClientState::Disconnected);
            return Err(e.into());
        }

        if let Some(info) = &init.server_info {
            debug!(
                provider = %self.provider_id,
                server = %info.name,
                version = %info.version,
                "Provider handshake complete"
            );
            *self.server_name.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(info.name.clone());
        }
        self.set_state(ClientState::Ready);
        Ok(init)
    }

    /// `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<DiscoveredTool>> {
        let result = self.request(methods::TOOLS_LIST, None).await?;
        let listing: ListToolsResult = serde_json::from_value(result.clone()).map_err(|e| {
            ProtocolError::Parse {
                error: e.to_string(),
                raw: result.to_string(),
            }
        })?;

        let mut tools = Vec::with_capacity(listing.tools.len());
        for wire in listing.tools {
            let schema_value = wire.input_schema.unwrap_or(serde_json::Value::Null);
            match ToolSchema::from_json(&schema_value) {
                Ok(input_schema) => tools.push(DiscoveredTool {
                    name: wire.name,
                    description: wire.description,
                    input_schema,
                }),
                Err(e) => {
                    // Fail closed for this tool only; the listing survives.
                    warn!(
                        provider = %self.provider_id,
                        tool = %wire.name,
                        error = %e,
                        "Skipping tool with malformed input schema"
                    );
                }
            }
        }
        Ok(tools)
    }

    /// `tools/call`.
    ///
    /// A provider-side `isError: true` is surfaced in the output flag, not
    /// as an `Err` — the wire round trip succeeded.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, serde_json::Value>,
    ) -> Result<ProviderCallOutput> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments: serde_json::Value::Object(arguments.clone()),
        })?;
        let result = self.request(methods::TOOLS_CALL, Some(params)).await?;
        let call: CallToolResult = serde_json::from_value(result.clone()).map_err(|e| {
            ProtocolError::Parse {
                error: e.to_string(),
                raw: result.to_string(),
            }
        })?;

        Ok(ProviderCallOutput {
            content: call
                .content
                .into_iter()
                .filter_map(|block| block.into_tool_content())
                .collect(),
            is_error: call.is_error.unwrap_or(false),
            retryable_hint: None,
        })
    }

    /// `ping` — cheap liveness probe.
    pub async fn ping(&self) -> Result<()> {
        self.request(methods::PING, None).await.map(|_| ())
    }

    /// Close the connection. Pending requests resolve with
    /// [`ProtocolError::Closed`]; the transport is torn down.
    pub async fn shutdown(&self) {
        self.set_state(ClientState::Closed);
        self.fail_pending(|| ProtocolError::Closed);
        self.transport.disconnect().await;
    }

    /// Issue a request, gated on `Ready`.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        match self.state() {
            ClientState::Ready => self.raw_request(method, params).await,
            ClientState::Closed => Err(ProtocolError::Closed),
            _ => Err(ProtocolError::NotInitialized),
        }
    }

    /// Issue a request regardless of state (used by the handshake itself).
    async fn raw_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(id, tx);
        }

        let frame = serde_json::to_string(&request)?;
        trace!(provider = %self.provider_id, %frame, "Sending request");
        if let Err(e) = self.transport.send(&frame).await {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProtocolError::Closed),
            Err(_) => {
                // Clean up the orphaned entry so a very late response is
                // simply dropped.
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.remove(&id);
                warn!(provider = %self.provider_id, method, id, "Request timed out");
                Err(ProtocolError::RequestTimeout(method.to_string()))
            }
        }
    }

    fn set_state(&self, state: ClientState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn fail_pending(&self, error: impl Fn() -> ProtocolError) {
        let entries: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().collect()
        };
        for (_, tx) in entries {
            let _ = tx.send(Err(error()));
        }
    }

    /// Background reader — sole consumer of the incoming frame channel.
    fn spawn_reader(&self, mut frames: crate::transport::IncomingFrames) {
        let provider_id = self.provider_id.clone();
        let pending = Arc::clone(&self.pending);
        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(provider = %provider_id, error = %e, "Transport failed");
                        break;
                    }
                };
                trace!(provider = %provider_id, %frame, "Received frame");

                let json: serde_json::Value = match serde_json::from_str(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(provider = %provider_id, error = %e, "Discarding unparseable frame");
                        continue;
                    }
                };

                match classify_message(&json) {
                    MessageKind::Response => {
                        let response: JsonRpcResponse = match serde_json::from_value(json) {
                            Ok(response) => response,
                            Err(e) => {
                                warn!(provider = %provider_id, error = %e, "Malformed response");
                                continue;
                            }
                        };
                        let Some(id) = response.id_as_u64() else {
                            warn!(provider = %provider_id, "Response with uncorrelatable id");
                            continue;
                        };
                        let sender = {
                            let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
                            pending.remove(&id)
                        };
                        let Some(tx) = sender else {
                            debug!(provider = %provider_id, id, "No pending request for response");
                            continue;
                        };
                        let outcome = match response.error {
                            Some(error) => Err(ProtocolError::Rpc {
                                code: error.code,
                                message: error.message,
                            }),
                            None => Ok(response.result.unwrap_or(serde_json::Value::Null)),
                        };
                        let _ = tx.send(outcome);
                    }
                    MessageKind::IncomingRequest { id, method } => {
                        if method == methods::PING {
                            let pong = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": {}});
                            let _ = transport.send(&pong.to_string()).await;
                        } else {
                            debug!(provider = %provider_id, %method, id, "Ignoring provider request");
                        }
                    }
                    MessageKind::Notification { method } => {
                        trace!(provider = %provider_id, %method, "Provider notification");
                    }
                    MessageKind::Unrecognized => {
                        warn!(provider = %provider_id, "Frame with neither id nor method");
                    }
                }
            }

            // Transport gone: fail everything in flight, once.
            debug!(provider = %provider_id, "Reader loop ended");
            {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                if *state != ClientState::Closed {
                    *state = ClientState::Disconnected;
                }
            }
            let entries: Vec<_> = {
                let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.drain().collect()
            };
            for (_, tx) in entries {
                let _ = tx.send(Err(ProtocolError::Transport(
                    crate::transport::TransportError::ConnectionLost(
                        "connection to provider lost".into(),
                    ),
                )));
            }
        });
    }
}

#[async_trait]
impl ProviderClient for ProtocolClient {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn list_tools(&self) -> std::result::Result<Vec<DiscoveredTool>, ProviderError> {
        ProtocolClient::list_tools(self).await.map_err(Into::into)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, serde_json::Value>,
    ) -> std::result::Result<ProviderCallOutput, ProviderError> {
        ProtocolClient::call_tool(self, name, arguments)
            .await
            .map_err(Into::into)
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{IncomingFrames, TransportError};
    use tokio::sync::mpsc;

    /// Transport scripted by a responder closure: each sent request maps to
    /// zero or more reply frames.
    struct ScriptedTransport {
        responder: Box<dyn Fn(serde_json::Value) -> Vec<serde_json::Value> + Send + Sync>,
        tx: Mutex<Option<mpsc::UnboundedSender<std::result::Result<String, TransportError>>>>,
    }

    impl ScriptedTransport {
        fn new(
            responder: impl Fn(serde_json::Value) -> Vec<serde_json::Value> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                responder: Box::new(responder),
                tx: Mutex::new(None),
            })
        }

        /// Push a frame as if the provider sent it unprompted.
        fn inject(&self, frame: std::result::Result<String, TransportError>) {
            if let Some(tx) = self.tx.lock().unwrap().as_ref() {
                let _ = tx.send(frame);
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&self) -> std::result::Result<IncomingFrames, TransportError> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.tx.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn send(&self, frame: &str) -> std::result::Result<(), TransportError> {
            let json: serde_json::Value = serde_json::from_str(frame).unwrap();
            for reply in (self.responder)(json) {
                self.inject(Ok(reply.to_string()));
            }
            Ok(())
        }

        async fn disconnect(&self) {
            self.tx.lock().unwrap().take();
        }
    }

    /// Standard responder: full handshake, two tools, echoing tool calls.
    fn well_behaved(request: serde_json::Value) -> Vec<serde_json::Value> {
        let id = request.get("id").and_then(|v| v.as_u64());
        match request.get("method").and_then(|m| m.as_str()) {
            Some("initialize") => vec![serde_json::json!({
                "jsonrpc": "2.0", "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-provider", "version": "1.0.0"}
                }
            })],
            Some("tools/list") => vec![serde_json::json!({
                "jsonrpc": "2.0", "id": id,
                "result": {"tools": [
                    {"name": "search_issues", "description": "Search",
                     "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}},
                    {"name": "create_issue", "inputSchema": {"type": "object"}}
                ]}
            })],
            Some("tools/call") => {
                let name = request["params"]["name"].as_str().unwrap_or("?");
                if name == "broken" {
                    vec![serde_json::json!({
                        "jsonrpc": "2.0", "id": id,
                        "result": {"content": [{"type": "text", "text": "tool blew up"}], "isError": true}
                    })]
                } else {
                    vec![serde_json::json!({
                        "jsonrpc": "2.0", "id": id,
                        "result": {"content": [{"type": "text", "text": format!("{} ok", name)}]}
                    })]
                }
            }
            Some("ping") => vec![serde_json::json!({"jsonrpc": "2.0", "id": id, "result": {}})],
            // notifications/initialized and anything else: no reply
            _ => vec![],
        }
    }

    #[tokio::test]
    async fn handshake_reaches_ready_and_lists_tools() {
        let transport = ScriptedTransport::new(well_behaved);
        let client = ProtocolClient::new("github-mcp", transport);
        assert_eq!(client.state(), ClientState::Uninitialized);

        let init = client.initialize().await.unwrap();
        assert_eq!(client.state(), ClientState::Ready);
        assert_eq!(init.server_info.unwrap().name, "fake-provider");
        assert_eq!(client.server_name().as_deref(), Some("fake-provider"));

        let tools = ProtocolClient::list_tools(&client).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "search_issues");
        assert!(tools[0].input_schema.properties.contains_key("query"));
    }

    #[tokio::test]
    async fn rpcs_before_ready_fail_not_initialized() {
        let transport = ScriptedTransport::new(well_behaved);
        let client = ProtocolClient::new("p", transport);

        let err = ProtocolClient::list_tools(&client).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotInitialized));
    }

    #[tokio::test]
    async fn call_tool_success_and_is_error_flag() {
        let transport = ScriptedTransport::new(well_behaved);
        let client = ProtocolClient::new("p", transport);
        client.initialize().await.unwrap();

        let ok = ProtocolClient::call_tool(&client, "search_issues", &Map::new())
            .await
            .unwrap();
        assert!(!ok.is_error);
        assert_eq!(ok.content.len(), 1);

        // isError:true is data, not a transport failure.
        let failed = ProtocolClient::call_tool(&client, "broken", &Map::new())
            .await
            .unwrap();
        assert!(failed.is_error);
    }

    #[tokio::test]
    async fn rpc_error_response_maps_to_rpc_variant() {
        let transport = ScriptedTransport::new(|request| {
            let id = request.get("id").and_then(|v| v.as_u64());
            match request.get("method").and_then(|m| m.as_str()) {
                Some("initialize") => well_behaved(request.clone()),
                Some(_) => vec![serde_json::json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": {"code": -32601, "message": "method not found"}
                })],
                None => vec![],
            }
        });
        let client = ProtocolClient::new("p", transport);
        client.initialize().await.unwrap();

        let err = ProtocolClient::list_tools(&client).await.unwrap_err();
        match err {
            ProtocolError::Rpc { code, message } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("expected rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silent_provider_times_out_and_cleans_pending() {
        let transport = ScriptedTransport::new(|request| {
            match request.get("method").and_then(|m| m.as_str()) {
                Some("initialize") => well_behaved(request.clone()),
                // Accepts the request, never answers.
                _ => vec![],
            }
        });
        let client = ProtocolClient::new("p", transport)
            .with_request_timeout(Duration::from_millis(100));
        client.initialize().await.unwrap();

        let err = ProtocolClient::list_tools(&client).await.unwrap_err();
        assert!(matches!(err, ProtocolError::RequestTimeout(_)));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_fails_in_flight_and_disconnects() {
        let transport = ScriptedTransport::new(|request| {
            match request.get("method").and_then(|m| m.as_str()) {
                Some("initialize") => well_behaved(request.clone()),
                _ => vec![],
            }
        });
        let client = ProtocolClient::new("p", Arc::clone(&transport) as Arc<dyn Transport>);
        client.initialize().await.unwrap();

        let pending = tokio::spawn({
            let transport = Arc::clone(&transport);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                transport.inject(Err(TransportError::ConnectionLost("broken pipe".into())));
            }
        });

        let err = ProtocolClient::list_tools(&client).await.unwrap_err();
        pending.await.unwrap();
        assert!(matches!(err, ProtocolError::Transport(_)));
        // Give the reader task a beat to flip the state.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_moves_to_closed_and_rejects_rpcs() {
        let transport = ScriptedTransport::new(well_behaved);
        let client = ProtocolClient::new("p", transport);
        client.initialize().await.unwrap();
        client.shutdown().await;

        assert_eq!(client.state(), ClientState::Closed);
        let err = ProtocolClient::list_tools(&client).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Closed));
    }

    #[tokio::test]
    async fn provider_ping_request_is_answered() {
        let transport = ScriptedTransport::new(well_behaved);
        let client = ProtocolClient::new("p", Arc::clone(&transport) as Arc<dyn Transport>);
        client.initialize().await.unwrap();

        // Provider-initiated ping: the reader answers without involving any
        // pending request.
        transport.inject(Ok(
            serde_json::json!({"jsonrpc": "2.0", "id": 999, "method": "ping"}).to_string(),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.state(), ClientState::Ready);
        assert_eq!(client.pending_count(), 0);
    }
}
