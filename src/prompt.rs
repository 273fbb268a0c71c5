//! Prompt definition and builder API
//!
//! Prompts are named message-template generators. The advertised argument
//! list either comes from explicit [`PromptArgument`] declarations or is
//! derived from a declared input schema's top-level properties (in
//! declaration order).
//!
//! ```rust,ignore
//! let greet = PromptBuilder::new("greet")
//!     .description("Generate a greeting")
//!     .required_arg("name", "The name to greet")
//!     .handler(|args, _ctx| async move {
//!         let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("World");
//!         Ok(GetPromptResult::user_message(format!("Please greet {} warmly.", name)))
//!     });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Result;
use crate::protocol::{GetPromptResult, PromptArgument, PromptDefinition};
use crate::schema::{self, ArgumentValidator, SchemaSource};

/// Prompt handler trait
pub trait PromptHandler: Send + Sync {
    /// Generate the prompt messages from the given arguments.
    fn get(&self, args: Value, ctx: RequestContext) -> BoxFuture<'static, Result<GetPromptResult>>;
}

/// A complete prompt definition with handler
pub struct Prompt {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    arguments: Vec<PromptArgument>,
    validator: Option<ArgumentValidator>,
    handler: Arc<dyn PromptHandler>,
}

impl Prompt {
    /// Create a new prompt builder
    pub fn builder(name: impl Into<String>) -> PromptBuilder {
        PromptBuilder::new(name)
    }

    /// Get the prompt definition for prompts/list
    pub fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// The argument validator, when registration supplied one.
    pub fn validator(&self) -> Option<&ArgumentValidator> {
        self.validator.as_ref()
    }

    /// Generate the prompt with the given arguments
    pub fn get(
        &self,
        args: Value,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<GetPromptResult>> {
        self.handler.get(args, ctx)
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder API
// =============================================================================

/// Builder for creating prompts with a fluent API
pub struct PromptBuilder {
    name: String,
    title: Option<String>,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    source: Option<SchemaSource>,
}

impl PromptBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            arguments: Vec::new(),
            source: None,
        }
    }

    /// Set a human-readable title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the prompt description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required argument
    pub fn required_arg(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: Some(description.into()),
            required: true,
        });
        self
    }

    /// Declare an optional argument
    pub fn optional_arg(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: Some(description.into()),
            required: false,
        });
        self
    }

    /// Declare an argument directly
    pub fn argument(mut self, arg: PromptArgument) -> Self {
        self.arguments.push(arg);
        self
    }

    /// Declare the arguments via a JSON Schema document. Explicit argument
    /// declarations take precedence over the derived list.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.source = Some(SchemaSource::document(schema));
        self
    }

    /// Declare the arguments via a typed input: the argument list is derived
    /// from the type's schema and arguments are validated against it.
    pub fn input<T>(mut self) -> Self
    where
        T: DeserializeOwned + JsonSchema + 'static,
    {
        self.source = Some(SchemaSource::typed::<T>());
        self
    }

    /// Set the handler and build the prompt.
    pub fn handler<F, Fut>(self, handler: F) -> Prompt
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GetPromptResult>> + Send + 'static,
    {
        let resolved = schema::resolve(self.source);
        let arguments = if self.arguments.is_empty() {
            schema::prompt_arguments(&resolved.input_schema)
        } else {
            self.arguments
        };

        Prompt {
            name: self.name,
            title: self.title,
            description: self.description,
            arguments,
            validator: resolved.validator,
            handler: Arc::new(FnHandler { handler }),
        }
    }

    /// Build a prompt that always produces a single user message.
    pub fn user_message(self, text: impl Into<String>) -> Prompt {
        let text = text.into();
        self.handler(move |_args, _ctx| {
            let text = text.clone();
            async move { Ok(GetPromptResult::user_message(text)) }
        })
    }
}

/// Handler wrapping a function
struct FnHandler<F> {
    handler: F,
}

impl<F, Fut> PromptHandler for FnHandler<F>
where
    F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GetPromptResult>> + Send + 'static,
{
    fn get(&self, args: Value, ctx: RequestContext) -> BoxFuture<'static, Result<GetPromptResult>> {
        Box::pin((self.handler)(args, ctx))
    }
}
