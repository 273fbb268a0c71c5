//! MCP server core: registration surface and the dispatch state machine
//!
//! [`McpServer`] is transport-neutral: it accepts a decoded JSON-RPC
//! message plus a small context bag ([`DispatchOptions`]) and returns a
//! response, or `None` for notifications. Transports wire a
//! [`NotificationSender`] for server-to-client notifications and feed
//! messages through [`McpServer::dispatch`] (or the
//! [`Service`](tower_service::Service) impl when composing with tower
//! middleware).
//!
//! Dispatch per message:
//!
//! 1. classify request vs notification by presence of `id`
//! 2. extract `params._meta.progressToken` and bind a progress reporter
//!    when a session and sender are available
//! 3. build the request context
//! 4. resolve the method; unknown methods fail before middleware runs
//! 5. run the middleware chain around the tail, which invokes the handler
//!    and records the response in the context
//! 6. finalize: notifications yield `None`; requests yield exactly one
//!    response, synthesized or error-mapped as needed

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context as TaskContext, Poll};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_service::Service;

use crate::context::{AuthInfo, NotificationSender, ProgressReporter, RequestContext};
use crate::error::{Error, Result, RpcError};
use crate::middleware::{Middleware, Next, Tail};
use crate::prompt::Prompt;
use crate::protocol::{
    CallToolParams, GetPromptParams, Implementation, InitializeParams, InitializeResult,
    JSONRPC_VERSION, JsonRpcMessage, JsonRpcResponse, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, PROTOCOL_VERSION,
    ProgressToken, ReadResourceParams,
};
use crate::registry::Registry;
use crate::resource::{Resource, ResourceTemplate, ResourceUri};
use crate::schema::SchemaAdapter;
use crate::tool::Tool;

/// Hook consulted when a request handler fails.
///
/// Returning `Some` overrides the error sent to the client; returning
/// `None` falls through to the default mapping.
pub type ErrorHook = Arc<dyn Fn(&Error, &RequestContext) -> Option<RpcError> + Send + Sync>;

/// Per-dispatch context supplied by the transport.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// The transport session the message arrived on.
    pub session_id: Option<String>,
    /// Authenticated-caller information from the transport's auth layer.
    pub auth_info: Option<AuthInfo>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_auth_info(mut self, auth_info: AuthInfo) -> Self {
        self.auth_info = Some(auth_info);
        self
    }
}

/// The MCP server core.
///
/// Cloning is cheap and clones share the notification sender and
/// initialization state; registration methods consume `self` builder-style.
///
/// # Example
///
/// ```rust,ignore
/// let server = McpServer::new("my-server", "1.0.0")
///     .tool(echo_tool)
///     .middleware(middleware::from_fn(log_requests));
///
/// let response = server.dispatch(message, DispatchOptions::new()).await;
/// ```
#[derive(Clone)]
pub struct McpServer {
    inner: Arc<ServerInner>,
}

#[derive(Clone)]
struct ServerInner {
    server_name: String,
    server_version: String,
    registry: Registry,
    middlewares: Vec<Arc<dyn Middleware>>,
    on_error: Option<ErrorHook>,
    schema_adapter: Option<SchemaAdapter>,
    /// Wired by the transport; lives for the server lifetime.
    notification_sender: Arc<RwLock<Option<Arc<dyn NotificationSender>>>>,
    initialized: Arc<AtomicBool>,
}

impl McpServer {
    /// Create a server with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                server_name: name.into(),
                server_version: version.into(),
                registry: Registry::new(),
                middlewares: Vec::new(),
                on_error: None,
                schema_adapter: None,
                notification_sender: Arc::new(RwLock::new(None)),
                initialized: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Register a tool. Re-registering a name replaces the prior entry.
    pub fn tool(mut self, mut tool: Tool) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        if let Some(adapter) = &inner.schema_adapter {
            tool.apply_schema_adapter(adapter);
        }
        inner.registry.insert_tool(tool);
        self
    }

    /// Register a prompt. Re-registering a name replaces the prior entry.
    pub fn prompt(mut self, prompt: Prompt) -> Self {
        Arc::make_mut(&mut self.inner).registry.insert_prompt(prompt);
        self
    }

    /// Register a static resource. Re-registering a URI replaces the prior
    /// entry.
    pub fn resource(mut self, resource: Resource) -> Self {
        Arc::make_mut(&mut self.inner)
            .registry
            .insert_resource(resource);
        self
    }

    /// Register a resource template. Templates are tried in registration
    /// order when a `resources/read` URI matches no static resource.
    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        Arc::make_mut(&mut self.inner)
            .registry
            .insert_template(template);
        self
    }

    /// Append a middleware to the chain. Middleware run in registration
    /// order around every dispatch.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        Arc::make_mut(&mut self.inner)
            .middlewares
            .push(Arc::new(middleware));
        self
    }

    /// Set the error hook. Replaces any previously set hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error, &RequestContext) -> Option<RpcError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner).on_error = Some(Arc::new(hook));
        self
    }

    /// Set the schema adapter used to rewrite the advertised schema of
    /// validator-backed registrations. Applies to tools registered after
    /// this call.
    pub fn schema_adapter<F>(mut self, adapter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner).schema_adapter = Some(Arc::new(adapter));
        self
    }

    /// Wire the transport's notification sender. May be called at any time;
    /// the sender is shared by all clones of this server.
    pub fn set_notification_sender(&self, sender: Arc<dyn NotificationSender>) {
        *self.inner.notification_sender.write().unwrap() = Some(sender);
    }

    /// The currently wired notification sender, if any.
    pub fn notification_sender(&self) -> Option<Arc<dyn NotificationSender>> {
        self.inner.notification_sender.read().unwrap().clone()
    }

    /// True once an `initialize` request has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    pub fn server_name(&self) -> &str {
        &self.inner.server_name
    }

    pub fn server_version(&self) -> &str {
        &self.inner.server_version
    }

    /// Dispatch one decoded JSON-RPC message.
    ///
    /// Requests produce exactly one response with the request's `id`;
    /// notifications always produce `None`, even when handling fails.
    pub async fn dispatch(
        &self,
        message: JsonRpcMessage,
        options: DispatchOptions,
    ) -> Option<JsonRpcResponse> {
        let is_request = message.is_request();
        let request_id = message.id.clone();
        tracing::debug!(method = ?message.method, id = ?request_id, "dispatching message");

        if message.jsonrpc != JSONRPC_VERSION {
            let id = request_id?;
            return Some(JsonRpcResponse::error(
                id,
                RpcError::invalid_request(format!(
                    "Invalid JSON-RPC version: expected '{}', got '{}'",
                    JSONRPC_VERSION, message.jsonrpc
                )),
            ));
        }

        let progress = self.bind_progress(&message, &options);
        let ctx = RequestContext::new(
            message.clone(),
            options.session_id,
            options.auth_info,
            progress,
        );

        let outcome = self.run(&message, &ctx).await;

        if !is_request {
            if let Err(err) = outcome {
                tracing::debug!(error = %err, "notification dispatch failed");
            }
            return None;
        }

        let id = request_id.expect("requests are classified by id presence");
        let response = match outcome {
            Ok(()) => ctx.take_response().unwrap_or_else(|| {
                JsonRpcResponse::error(
                    id.clone(),
                    RpcError::internal_error("No response generated"),
                )
            }),
            Err(err) => JsonRpcResponse::error(id.clone(), self.map_error(err, &ctx)),
        };
        Some(response)
    }

    /// Bind a progress reporter iff a token, a session, and a sender all
    /// exist.
    fn bind_progress(
        &self,
        message: &JsonRpcMessage,
        options: &DispatchOptions,
    ) -> Option<ProgressReporter> {
        let token = extract_progress_token(message.params.as_ref())?;
        let session_id = options.session_id.clone()?;
        let sender = self.inner.notification_sender.read().unwrap().clone()?;
        Some(ProgressReporter::new(
            sender,
            session_id,
            token,
            message.id.clone(),
        ))
    }

    /// Resolve the method, then run the middleware chain around the tail.
    async fn run(&self, message: &JsonRpcMessage, ctx: &RequestContext) -> Result<()> {
        let Some(method) = message.method.clone() else {
            return Err(RpcError::method_missing().into());
        };
        if !is_known_method(&method) {
            return Err(RpcError::method_not_found(&method).into());
        }

        let inner = self.inner.clone();
        let params = message.params.clone();
        let tail: Tail = Arc::new(move |ctx: RequestContext| {
            let inner = inner.clone();
            let method = method.clone();
            let params = params.clone();
            Box::pin(async move {
                let result = route(&inner, &method, params, &ctx).await?;
                if let Some(id) = ctx.request_id() {
                    let id = id.clone();
                    ctx.set_response(JsonRpcResponse::result(id, result));
                }
                Ok(())
            })
        });

        let chain: Arc<[Arc<dyn Middleware>]> = self.inner.middlewares.clone().into();
        Next::new(chain, tail).run(ctx).await
    }

    fn map_error(&self, err: Error, ctx: &RequestContext) -> RpcError {
        if let Some(hook) = &self.inner.on_error
            && let Some(rpc) = hook(&err, ctx)
        {
            return rpc;
        }
        err.into_rpc()
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("server_name", &self.inner.server_name)
            .field("server_version", &self.inner.server_version)
            .field("tools", &self.inner.registry.tools().len())
            .field("prompts", &self.inner.registry.prompts().len())
            .field("resources", &self.inner.registry.resources().len())
            .field("middlewares", &self.inner.middlewares.len())
            .finish()
    }
}

/// Pull `params._meta.progressToken` out of raw params.
///
/// The token lives under `_meta` only; anything other than a string or an
/// integer is rejected.
fn extract_progress_token(params: Option<&Value>) -> Option<ProgressToken> {
    match params?.get("_meta")?.get("progressToken")? {
        Value::String(s) => Some(ProgressToken::String(s.clone())),
        Value::Number(n) => n.as_i64().map(ProgressToken::Number),
        _ => None,
    }
}

fn is_known_method(method: &str) -> bool {
    matches!(
        method,
        "initialize"
            | "ping"
            | "tools/list"
            | "tools/call"
            | "prompts/list"
            | "prompts/get"
            | "resources/list"
            | "resources/templates/list"
            | "resources/read"
            | "resources/subscribe"
            | "resources/unsubscribe"
            | "completion/complete"
            | "logging/setLevel"
    ) || method.starts_with("notifications/")
}

/// Parse request params, defaulting absent params to `{}`.
fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| RpcError::invalid_params(format!("Invalid params: {}", e)).into())
}

/// The built-in method table.
async fn route(
    inner: &Arc<ServerInner>,
    method: &str,
    params: Option<Value>,
    ctx: &RequestContext,
) -> Result<Value> {
    // Inbound notifications are accepted and ignored, including
    // notifications/cancelled (no cancellation is threaded into handlers).
    if method.starts_with("notifications/") {
        return Ok(json!({}));
    }

    match method {
        "initialize" => {
            let params: InitializeParams = parse_params(params)?;
            if params.protocol_version != PROTOCOL_VERSION {
                return Err(RpcError::protocol_version_mismatch(
                    PROTOCOL_VERSION,
                    &params.protocol_version,
                )
                .into());
            }

            inner.initialized.store(true, Ordering::SeqCst);
            tracing::info!(
                client = %params.client_info.name,
                version = %params.client_info.version,
                "client initialized"
            );

            Ok(serde_json::to_value(InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                server_info: Implementation {
                    name: inner.server_name.clone(),
                    version: inner.server_version.clone(),
                },
                capabilities: inner.registry.capabilities(),
            })?)
        }

        "ping" => Ok(json!({})),

        "tools/list" => {
            let tools = inner.registry.tools().iter().map(|t| t.definition()).collect();
            Ok(serde_json::to_value(ListToolsResult { tools })?)
        }

        "tools/call" => {
            let params: CallToolParams = parse_params(params)?;
            let tool = inner
                .registry
                .tool(&params.name)
                .ok_or_else(|| RpcError::method_not_found(&params.name))?;

            let raw_args = params.arguments.unwrap_or_else(|| json!({}));
            let args = match tool.validator() {
                Some(validator) => ctx.validate(validator, raw_args)?,
                None => raw_args,
            };

            tracing::debug!(tool = %params.name, "calling tool");
            let result = tool.call(args, ctx.clone()).await?;
            Ok(serde_json::to_value(result)?)
        }

        "prompts/list" => {
            let prompts = inner
                .registry
                .prompts()
                .iter()
                .map(|p| p.definition())
                .collect();
            Ok(serde_json::to_value(ListPromptsResult { prompts })?)
        }

        "prompts/get" => {
            let params: GetPromptParams = parse_params(params)?;
            let prompt = inner.registry.prompt(&params.name).ok_or_else(|| {
                RpcError::invalid_params("Unknown prompt")
                    .with_data(json!({ "name": params.name.clone() }))
            })?;

            let raw_args = params.arguments.unwrap_or_else(|| json!({}));
            let args = match prompt.validator() {
                Some(validator) => ctx.validate(validator, raw_args)?,
                None => raw_args,
            };

            tracing::debug!(prompt = %params.name, "getting prompt");
            let result = prompt.get(args, ctx.clone()).await?;
            Ok(serde_json::to_value(result)?)
        }

        "resources/list" => {
            let resources = inner
                .registry
                .resources()
                .iter()
                .map(|r| r.definition())
                .collect();
            Ok(serde_json::to_value(ListResourcesResult { resources })?)
        }

        "resources/templates/list" => {
            let resource_templates = inner
                .registry
                .templates()
                .iter()
                .map(|t| t.definition())
                .collect();
            Ok(serde_json::to_value(ListResourceTemplatesResult { resource_templates })?)
        }

        "resources/read" => {
            let params: ReadResourceParams = parse_params(params)?;

            // Exact static match wins over any template.
            if let Some(resource) = inner.registry.resource(&params.uri) {
                tracing::debug!(uri = %params.uri, "reading static resource");
                let result = resource.read(ctx.clone()).await?;
                return Ok(serde_json::to_value(result)?);
            }

            // First matching template in registration order.
            for template in inner.registry.templates() {
                if let Some(raw_vars) = template.match_uri(&params.uri) {
                    tracing::debug!(
                        uri = %params.uri,
                        template = %template.uri_template,
                        "reading resource via template"
                    );
                    let vars = template.validate_vars(raw_vars)?;
                    let result = template
                        .read(ResourceUri::new(params.uri.clone()), vars, ctx.clone())
                        .await?;
                    return Ok(serde_json::to_value(result)?);
                }
            }

            Err(RpcError::resource_not_found(&params.uri).into())
        }

        "resources/subscribe" | "resources/unsubscribe" | "completion/complete" => {
            Err(RpcError::not_implemented(method).into())
        }

        "logging/setLevel" => {
            tracing::debug!("logging/setLevel acknowledged");
            Ok(json!({}))
        }

        other => Err(RpcError::method_not_found(other).into()),
    }
}

// =============================================================================
// Tower service integration
// =============================================================================

/// Request type for the tower [`Service`] impl: a decoded message plus the
/// transport-supplied dispatch options.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub message: JsonRpcMessage,
    pub options: DispatchOptions,
}

impl DispatchRequest {
    pub fn new(message: JsonRpcMessage, options: DispatchOptions) -> Self {
        Self { message, options }
    }
}

impl Service<DispatchRequest> for McpServer {
    type Response = Option<JsonRpcResponse>;
    // Dispatch never fails at the service level: errors become responses.
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<std::result::Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        let server = self.clone();
        Box::pin(async move { Ok(server.dispatch(req.message, req.options).await) })
    }
}
