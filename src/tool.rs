//! Tool definition and builder API
//!
//! Tools are named, argument-validated callables. Two registration styles:
//!
//! 1. **Typed** - the handler takes a `Deserialize + JsonSchema` input; the
//!    advertised schema and the argument validator are derived from it.
//! 2. **Raw** - the handler takes raw JSON; the advertised schema comes
//!    from [`ToolBuilder::input_schema`] (or defaults to
//!    `{"type": "object"}`) and arguments pass through unvalidated unless a
//!    validator was attached.
//!
//! ```rust,ignore
//! let echo = ToolBuilder::new("echo")
//!     .description("Echo a message")
//!     .handler(|input: EchoInput, _ctx| async move {
//!         Ok(CallToolResult::text(input.message))
//!     })
//!     .build();
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::{Result, RpcError};
use crate::protocol::{CallToolResult, ToolDefinition};
use crate::schema::{self, ArgumentValidator, ResolvedSchema, SchemaAdapter, SchemaSource};

/// Tool handler trait - the core abstraction for tool execution
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given (already validated) arguments.
    fn call(&self, args: Value, ctx: RequestContext) -> BoxFuture<'static, Result<CallToolResult>>;
}

/// A complete tool definition with handler
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    pub(crate) schema: ResolvedSchema,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a new tool builder
    pub fn builder(name: impl Into<String>) -> ToolBuilder {
        ToolBuilder::new(name)
    }

    /// Get the tool definition for tools/list
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.input_schema.clone(),
        }
    }

    /// The argument validator, when registration supplied one.
    pub fn validator(&self) -> Option<&ArgumentValidator> {
        self.schema.validator.as_ref()
    }

    /// Call the tool
    pub fn call(
        &self,
        args: Value,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<CallToolResult>> {
        self.handler.call(args, ctx)
    }

    /// Rewrite the advertised schema through the embedder's adapter.
    /// Only validator-backed registrations are adapted.
    pub(crate) fn apply_schema_adapter(&mut self, adapter: &SchemaAdapter) {
        if self.schema.from_validator {
            let current = std::mem::replace(&mut self.schema.input_schema, Value::Null);
            self.schema.input_schema = adapter(current);
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder API
// =============================================================================

/// Builder for creating tools with a fluent API
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
    source: Option<SchemaSource>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            source: None,
        }
    }

    /// Set the tool description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Advertise an explicit JSON Schema for the tool input.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.source = Some(SchemaSource::document(schema));
        self
    }

    /// Attach an opaque argument validator. The advertised schema defaults
    /// to `{"type": "object"}` unless the server's schema adapter rewrites it.
    pub fn validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<Value, RpcError> + Send + Sync + 'static,
    {
        self.source = Some(SchemaSource::validator(validate));
        self
    }

    /// Set any schema source directly.
    pub fn schema_source(mut self, source: SchemaSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Specify a typed handler.
    ///
    /// Unless an explicit schema source was set, the input type supplies
    /// both the advertised schema and the argument validator.
    pub fn handler<I, F, Fut>(self, handler: F) -> ToolBuilderWithHandler<I, F>
    where
        I: JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(I, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        ToolBuilderWithHandler {
            name: self.name,
            description: self.description,
            source: self.source,
            handler,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Create a tool with raw JSON handling (no automatic deserialization)
    pub fn raw_handler<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        Tool {
            name: self.name,
            description: self.description,
            schema: schema::resolve(self.source),
            handler: Arc::new(RawHandler { handler }),
        }
    }
}

/// Builder state after a typed handler is specified
pub struct ToolBuilderWithHandler<I, F> {
    name: String,
    description: Option<String>,
    source: Option<SchemaSource>,
    handler: F,
    _phantom: std::marker::PhantomData<fn() -> I>,
}

impl<I, F, Fut> ToolBuilderWithHandler<I, F>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
    F: Fn(I, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
{
    /// Build the tool
    pub fn build(self) -> Tool {
        let source = self.source.unwrap_or_else(SchemaSource::typed::<I>);
        Tool {
            name: self.name,
            description: self.description,
            schema: schema::resolve(Some(source)),
            handler: Arc::new(TypedHandler {
                handler: self.handler,
                _phantom: std::marker::PhantomData,
            }),
        }
    }
}

// =============================================================================
// Handler implementations
// =============================================================================

/// Handler that deserializes input to a specific type
struct TypedHandler<I, F> {
    handler: F,
    _phantom: std::marker::PhantomData<fn() -> I>,
}

impl<I, F, Fut> ToolHandler for TypedHandler<I, F>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
    F: Fn(I, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
{
    fn call(&self, args: Value, ctx: RequestContext) -> BoxFuture<'static, Result<CallToolResult>> {
        match serde_json::from_value::<I>(args) {
            Ok(input) => Box::pin((self.handler)(input, ctx)),
            Err(e) => Box::pin(async move {
                Err(RpcError::invalid_params(format!("Invalid arguments: {}", e)).into())
            }),
        }
    }
}

/// Handler that works with raw JSON
struct RawHandler<F> {
    handler: F,
}

impl<F, Fut> ToolHandler for RawHandler<F>
where
    F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
{
    fn call(&self, args: Value, ctx: RequestContext) -> BoxFuture<'static, Result<CallToolResult>> {
        Box::pin((self.handler)(args, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcMessage;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct GreetInput {
        name: String,
    }

    fn test_context() -> RequestContext {
        RequestContext::new(JsonRpcMessage::request(1, "tools/call"), None, None, None)
    }

    #[tokio::test]
    async fn test_typed_tool() {
        let tool = ToolBuilder::new("greet")
            .description("Greet someone")
            .handler(|input: GreetInput, _ctx| async move {
                Ok(CallToolResult::text(format!("Hello, {}!", input.name)))
            })
            .build();

        assert_eq!(tool.name, "greet");
        assert_eq!(tool.description.as_deref(), Some("Greet someone"));
        assert!(tool.validator().is_some());

        let result = tool
            .call(json!({"name": "World"}), test_context())
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("Hello, World!"));
    }

    #[tokio::test]
    async fn test_typed_tool_rejects_bad_input() {
        let tool = ToolBuilder::new("greet")
            .handler(|input: GreetInput, _ctx| async move {
                Ok(CallToolResult::text(input.name))
            })
            .build();

        let err = tool.call(json!({"name": 42}), test_context()).await.unwrap_err();
        assert_eq!(err.into_rpc().code, -32602);
    }

    #[tokio::test]
    async fn test_raw_handler_passes_value_through() {
        let tool = ToolBuilder::new("echo")
            .raw_handler(|args: Value, _ctx| async move { Ok(CallToolResult::json(args)) });

        let result = tool
            .call(json!({"foo": "bar"}), test_context())
            .await
            .unwrap();
        assert_eq!(result.structured_content, Some(json!({"foo": "bar"})));
    }

    #[test]
    fn test_raw_tool_default_schema() {
        let tool =
            ToolBuilder::new("anything").raw_handler(|_args, _ctx| async { Ok(CallToolResult::text("ok")) });
        assert_eq!(tool.definition().input_schema, json!({"type": "object"}));
        assert!(tool.validator().is_none());
    }

    #[test]
    fn test_explicit_schema_wins_over_typed_derivation() {
        let doc = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let tool = ToolBuilder::new("greet")
            .input_schema(doc.clone())
            .handler(|input: GreetInput, _ctx| async move {
                Ok(CallToolResult::text(input.name))
            })
            .build();

        assert_eq!(tool.definition().input_schema, doc);
        // Document sources carry no validator; the typed handler still
        // rejects malformed input itself.
        assert!(tool.validator().is_none());
    }

    #[test]
    fn test_schema_adapter_only_rewrites_validator_backed() {
        let adapter: SchemaAdapter = Arc::new(|_schema| json!({"type": "object", "adapted": true}));

        let mut typed = ToolBuilder::new("typed")
            .handler(|input: GreetInput, _ctx| async move {
                Ok(CallToolResult::text(input.name))
            })
            .build();
        typed.apply_schema_adapter(&adapter);
        assert_eq!(typed.definition().input_schema["adapted"], true);

        let mut document = ToolBuilder::new("doc")
            .input_schema(json!({"type": "object"}))
            .raw_handler(|_args, _ctx| async { Ok(CallToolResult::text("ok")) });
        document.apply_schema_adapter(&adapter);
        assert!(document.definition().input_schema.get("adapted").is_none());
    }
}
