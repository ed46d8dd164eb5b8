//! HTTP transport with optional server-sent-event streaming.
//!
//! Each outgoing frame becomes one POST of the JSON-RPC body. The response
//! is either a single JSON-RPC message, or — when the provider answers with
//! `text/event-stream` — a long-lived body carrying several messages, one
//! per SSE `data:` event. Custom headers (bearer tokens etc.) are injected
//! on every request.
//!
//! "Connected" here only means the channel is set up; whether the provider
//! ever answers is the protocol client's request timeout to decide.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::{IncomingFrames, Transport, TransportError};

type FrameSender = mpsc::UnboundedSender<Result<String, TransportError>>;

/// Transport POSTing JSON-RPC frames to an HTTP endpoint.
pub struct HttpTransport {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
    incoming: Mutex<Option<FrameSender>>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            headers,
            client,
            incoming: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<IncomingFrames, TransportError> {
        let mut incoming = self.incoming.lock().await;
        if incoming.is_some() {
            return Err(TransportError::Connect("already connected".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *incoming = Some(tx);
        Ok(rx)
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let tx = {
            let incoming = self.incoming.lock().await;
            incoming.as_ref().cloned().ok_or(TransportError::Closed)?
        };

        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream");
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let request = request.body(frame.to_string());
        let url = self.url.clone();

        // The response (or stream of responses) arrives on the frame
        // channel; the caller correlates by JSON-RPC id.
        tokio::spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %url, error = %e, "HTTP request failed");
                    let _ = tx.send(Err(TransportError::ConnectionLost(e.to_string())));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                warn!(url = %url, %status, "HTTP request rejected");
                let _ = tx.send(Err(TransportError::ConnectionLost(format!(
                    "endpoint returned {}",
                    status
                ))));
                return;
            }

            let is_event_stream = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.starts_with("text/event-stream"))
                .unwrap_or(false);

            if is_event_stream {
                debug!(url = %url, "Reading SSE response stream");
                let mut parser = SseParser::default();
                let mut body = response.bytes_stream();
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for event in parser.feed(&String::from_utf8_lossy(&bytes)) {
                                let _ = tx.send(Ok(event));
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(TransportError::ConnectionLost(e.to_string())));
                            return;
                        }
                    }
                }
                for event in parser.finish() {
                    let _ = tx.send(Ok(event));
                }
            } else {
                match response.text().await {
                    Ok(body) if !body.trim().is_empty() => {
                        let _ = tx.send(Ok(body.trim().to_string()));
                    }
                    Ok(_) => {} // e.g. 202 Accepted for a notification
                    Err(e) => {
                        let _ = tx.send(Err(TransportError::ConnectionLost(e.to_string())));
                    }
                }
            }
        });

        Ok(())
    }

    async fn disconnect(&self) {
        // Dropping the sender closes the frame channel.
        self.incoming.lock().await.take();
    }
}

/// Incremental server-sent-event parser.
///
/// Events may span chunk boundaries; `feed` returns the data payloads of
/// every event completed so far. Multiple `data:` lines within one event
/// are joined with newlines per the SSE spec; comment and non-data fields
/// are ignored.
#[derive(Default)]
struct SseParser {
    buffer: String,
}

impl SseParser {
    fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(boundary) = find_event_boundary(&self.buffer) {
            let block: String = self.buffer.drain(..boundary.end).collect();
            if let Some(data) = parse_event_block(&block[..boundary.start]) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    fn finish(&mut self) -> Vec<String> {
        let block = std::mem::take(&mut self.buffer);
        parse_event_block(&block).into_iter().collect()
    }
}

struct EventBoundary {
    /// End of the event's content.
    start: usize,
    /// End of the separator (start of the next event).
    end: usize,
}

fn find_event_boundary(buffer: &str) -> Option<EventBoundary> {
    let lf = buffer.find("\n\n").map(|i| EventBoundary {
        start: i,
        end: i + 2,
    });
    let crlf = buffer.find("\r\n\r\n").map(|i| EventBoundary {
        start: i,
        end: i + 4,
    });
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event_block(block: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // `event:`, `id:`, `retry:` and `:` comments carry no payload here.
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn sse_parser_splits_events() {
        let mut parser = SseParser::default();
        let events = parser.feed("data: {\"id\":1}\n\ndata: {\"id\":2}\n\n");
        assert_eq!(events, vec![r#"{"id":1}"#, r#"{"id":2}"#]);
    }

    #[test]
    fn sse_parser_handles_chunk_boundaries() {
        let mut parser = SseParser::default();
        assert!(parser.feed("data: {\"id\"").is_empty());
        assert!(parser.feed(":1}\n").is_empty());
        let events = parser.feed("\ndata: {\"id\":2}\n\n");
        assert_eq!(events, vec![r#"{"id":1}"#, r#"{"id":2}"#]);
    }

    #[test]
    fn sse_parser_joins_multiline_data_and_skips_comments() {
        let mut parser = SseParser::default();
        let events = parser.feed(": keep-alive\nevent: message\ndata: line one\ndata: line two\n\n");
        assert_eq!(events, vec!["line one\nline two"]);
    }

    #[test]
    fn sse_parser_handles_crlf_framing() {
        let mut parser = SseParser::default();
        let events = parser.feed("data: {\"a\":1}\r\n\r\n");
        assert_eq!(events, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn sse_parser_finish_flushes_unterminated_event() {
        let mut parser = SseParser::default();
        assert!(parser.feed("data: tail").is_empty());
        assert_eq!(parser.finish(), vec!["tail"]);
    }

    #[tokio::test]
    async fn plain_json_response_round_trips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Bearer token-1".to_string());
        let transport = HttpTransport::new(format!("{}/rpc", server.uri()), headers);
        let mut frames = transport.connect().await.unwrap();

        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .await
            .unwrap();
        let frame = frames.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
    }

    #[tokio::test]
    async fn event_stream_response_yields_one_frame_per_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(body_string_contains("tools/call"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\ndata: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{}}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/rpc", server.uri()), HashMap::new());
        let mut frames = transport.connect().await.unwrap();

        transport
            .send(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call"}"#)
            .await
            .unwrap();
        let first = frames.recv().await.unwrap().unwrap();
        assert!(first.contains("notifications/progress"));
        let second = frames.recv().await.unwrap().unwrap();
        assert!(second.contains("\"id\":7"));
    }

    #[tokio::test]
    async fn error_status_surfaces_as_connection_lost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), HashMap::new());
        let mut frames = transport.connect().await.unwrap();
        transport.send(r#"{"id":1}"#).await.unwrap();

        let frame = frames.recv().await.unwrap();
        assert!(matches!(frame, Err(TransportError::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let transport = HttpTransport::new("http://127.0.0.1:1/rpc", HashMap::new());
        assert!(matches!(
            transport.send("{}").await,
            Err(TransportError::Closed)
        ));
    }
}
