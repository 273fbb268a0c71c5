//! # mcp-dispatch
//!
//! Transport-agnostic dispatch core for Model Context Protocol (MCP)
//! servers.
//!
//! This crate is the JSON-RPC 2.0 request dispatcher at the heart of an
//! MCP server: a capability registry for **tools**, **prompts**, and
//! **resources**, a composable middleware pipeline, schema-based argument
//! validation, URI-template-driven resource routing, and in-band progress
//! notifications correlated to the originating request.
//!
//! ## Philosophy
//!
//! The core is deliberately transport-neutral: it accepts a decoded
//! JSON-RPC message plus a small context bag and returns a response (or
//! `None` for notifications). HTTP/stdio framing, session storage, and
//! authentication live in the embedding transport, which talks to the core
//! through exactly two interfaces: [`dispatch`](McpServer::dispatch) going
//! in, and a [`NotificationSender`] going out. The server also implements
//! tower's `Service`, so standard tower middleware composes around it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcp_dispatch::{
//!     CallToolResult, DispatchOptions, JsonRpcMessage, McpServer, ToolBuilder,
//! };
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct EchoInput {
//!     m: String,
//! }
//!
//! let server = McpServer::new("echo-server", "1.0.0").tool(
//!     ToolBuilder::new("echo")
//!         .description("Echo a message")
//!         .handler(|input: EchoInput, _ctx| async move {
//!             Ok(CallToolResult::text(input.m))
//!         })
//!         .build(),
//! );
//!
//! let message = JsonRpcMessage::request(1, "tools/call")
//!     .with_params(json!({"name": "echo", "arguments": {"m": "hi"}}));
//! let response = server.dispatch(message, DispatchOptions::new()).await;
//! ```

pub mod context;
pub mod error;
pub mod middleware;
pub mod prompt;
pub mod protocol;
pub mod resource;
pub mod schema;
pub mod server;
pub mod testing;
pub mod tool;
pub mod uri_template;

mod registry;

// Re-exports
pub use context::{
    AuthInfo, Extensions, NotificationOptions, NotificationSender, ProgressReporter,
    RequestContext,
};
pub use error::{BoxError, Error, ErrorCode, Result, RpcError};
pub use middleware::{FnMiddleware, Middleware, Next};
pub use prompt::{Prompt, PromptBuilder};
pub use protocol::{
    CallToolResult, Content, GetPromptResult, Implementation, JSONRPC_VERSION, JsonRpcMessage,
    JsonRpcNotification, JsonRpcResponse, PROTOCOL_VERSION, ProgressToken, PromptArgument,
    PromptMessage, PromptRole, ReadResourceResult, RequestId, ResourceContent,
    ServerCapabilities,
};
pub use resource::{
    Resource, ResourceBuilder, ResourceTemplate, ResourceTemplateBuilder, ResourceUri,
    VariableValidator,
};
pub use schema::{ArgumentValidator, SchemaAdapter, SchemaSource};
pub use server::{DispatchOptions, DispatchRequest, ErrorHook, McpServer};
pub use testing::{RecordingSender, TestClient};
pub use tool::{Tool, ToolBuilder};
pub use uri_template::{TemplateError, UriTemplate};
