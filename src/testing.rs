//! Test utilities for MCP servers
//!
//! [`TestClient`] wraps an [`McpServer`] for concise request/response tests
//! without manual JSON-RPC envelope construction, and [`RecordingSender`]
//! captures notifications emitted through the server's notification sender
//! together with their delivery options.
//!
//! ```rust,ignore
//! let mut client = TestClient::new(server);
//! client.initialize().await;
//!
//! let result = client.call_tool("echo", json!({"m": "hi"})).await;
//! assert_eq!(result.first_text(), Some("hi"));
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::{NotificationOptions, NotificationSender};
use crate::error::{Result, RpcError};
use crate::protocol::{
    CallToolResult, GetPromptResult, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse,
    PROTOCOL_VERSION, ReadResourceResult,
};
use crate::server::{DispatchOptions, McpServer};

/// An ergonomic driver for exercising a server in tests.
///
/// Request helpers panic on unexpected error responses; use the
/// `*_expect_error` variants to assert failures.
pub struct TestClient {
    server: McpServer,
    options: DispatchOptions,
    next_id: i64,
}

impl TestClient {
    /// Wrap a server with no session id.
    pub fn new(server: McpServer) -> Self {
        Self {
            server,
            options: DispatchOptions::new(),
            next_id: 0,
        }
    }

    /// Wrap a server, dispatching under the given session id.
    pub fn with_session(server: McpServer, session_id: impl Into<String>) -> Self {
        Self {
            server,
            options: DispatchOptions::new().with_session_id(session_id),
            next_id: 0,
        }
    }

    /// The wrapped server.
    pub fn server(&self) -> &McpServer {
        &self.server
    }

    /// Dispatch a raw message without any assertions.
    pub async fn dispatch_raw(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        self.server.dispatch(message, self.options.clone()).await
    }

    /// Run the initialize handshake and return the `initialize` result.
    pub async fn initialize(&mut self) -> Value {
        let result = self
            .send_request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "test-client", "version": "0.0.0" }
                })),
            )
            .await;
        self.send_notification("notifications/initialized", None)
            .await;
        result
    }

    /// Send a request, panicking on an error response.
    pub async fn send_request(&mut self, method: &str, params: Option<Value>) -> Value {
        match self.request(method, params).await {
            JsonRpcResponse::Result(r) => r.result,
            JsonRpcResponse::Error(e) => {
                panic!("request '{}' failed: {:?}", method, e.error)
            }
        }
    }

    /// Send a request, panicking on a success response.
    pub async fn send_request_expect_error(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> RpcError {
        match self.request(method, params).await {
            JsonRpcResponse::Error(e) => e.error,
            JsonRpcResponse::Result(r) => {
                panic!("request '{}' unexpectedly succeeded: {:?}", method, r.result)
            }
        }
    }

    /// Send a notification, asserting that no response is produced.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) {
        let mut message = JsonRpcMessage::notification(method);
        if let Some(params) = params {
            message = message.with_params(params);
        }
        let response = self.dispatch_raw(message).await;
        assert!(response.is_none(), "notification produced a response");
    }

    pub async fn list_tools(&mut self) -> Vec<Value> {
        self.send_request("tools/list", None).await["tools"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> CallToolResult {
        let result = self
            .send_request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await;
        serde_json::from_value(result).expect("valid tool result")
    }

    pub async fn call_tool_expect_error(&mut self, name: &str, arguments: Value) -> RpcError {
        self.send_request_expect_error(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    pub async fn list_resources(&mut self) -> Vec<Value> {
        self.send_request("resources/list", None).await["resources"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn list_resource_templates(&mut self) -> Vec<Value> {
        self.send_request("resources/templates/list", None).await["resourceTemplates"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn read_resource(&mut self, uri: &str) -> ReadResourceResult {
        let result = self
            .send_request("resources/read", Some(json!({ "uri": uri })))
            .await;
        serde_json::from_value(result).expect("valid resource result")
    }

    pub async fn read_resource_expect_error(&mut self, uri: &str) -> RpcError {
        self.send_request_expect_error("resources/read", Some(json!({ "uri": uri })))
            .await
    }

    pub async fn list_prompts(&mut self) -> Vec<Value> {
        self.send_request("prompts/list", None).await["prompts"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get_prompt(&mut self, name: &str, arguments: Value) -> GetPromptResult {
        let result = self
            .send_request(
                "prompts/get",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await;
        serde_json::from_value(result).expect("valid prompt result")
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> JsonRpcResponse {
        self.next_id += 1;
        let mut message = JsonRpcMessage::request(self.next_id, method);
        if let Some(params) = params {
            message = message.with_params(params);
        }
        self.dispatch_raw(message)
            .await
            .expect("request produced no response")
    }
}

/// A notification captured by [`RecordingSender`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub session_id: Option<String>,
    pub notification: JsonRpcNotification,
    pub options: NotificationOptions,
}

/// A [`NotificationSender`] that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the captured notifications, in send order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        session_id: Option<&str>,
        notification: JsonRpcNotification,
        options: NotificationOptions,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(SentNotification {
            session_id: session_id.map(str::to_string),
            notification,
            options,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolBuilder;

    #[tokio::test]
    async fn test_client_round_trip() {
        let echo = ToolBuilder::new("echo").raw_handler(|args: Value, _ctx| async move {
            let m = args.get("m").and_then(Value::as_str).unwrap_or_default();
            Ok(CallToolResult::text(m))
        });
        let server = McpServer::new("test-server", "1.0.0").tool(echo);

        let mut client = TestClient::new(server);
        let init = client.initialize().await;
        assert_eq!(init["serverInfo"]["name"], "test-server");

        let tools = client.list_tools().await;
        assert_eq!(tools.len(), 1);

        let result = client.call_tool("echo", json!({"m": "hello"})).await;
        assert_eq!(result.first_text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_recording_sender_captures_options() {
        let sender = RecordingSender::new();
        sender
            .send(
                Some("s1"),
                JsonRpcNotification::new("notifications/progress"),
                NotificationOptions::default(),
            )
            .await
            .unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].session_id.as_deref(), Some("s1"));
        assert_eq!(sent[0].notification.method, "notifications/progress");
    }
}
