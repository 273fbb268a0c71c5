//! Resource definition and builder API
//!
//! Resources come in two shapes:
//!
//! 1. **Static** - a fixed URI with a handler (`file:///config.json`).
//! 2. **Templates** - a URI template with `{var}` placeholders
//!    (`github://repos/{owner}/{repo}`); the matcher extracts variables,
//!    optional per-variable validators check (and may coerce) them, and the
//!    handler receives the validated map.
//!
//! ```rust,ignore
//! let repo = ResourceTemplateBuilder::new("github://repos/{owner}/{repo}")
//!     .name("Repositories")
//!     .handler(|uri, vars, _ctx| async move {
//!         let owner = vars["owner"].as_str().unwrap_or_default();
//!         let repo = vars["repo"].as_str().unwrap_or_default();
//!         Ok(ReadResourceResult {
//!             contents: vec![ResourceContent::text(uri.href, format!("{owner}/{repo}"))],
//!         })
//!     })?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::{Result, RpcError};
use crate::protocol::{
    ReadResourceResult, ResourceContent, ResourceDefinition, ResourceTemplateDefinition,
};
use crate::uri_template::{TemplateError, UriTemplate};

/// The concrete URI a `resources/read` resolved to.
#[derive(Debug, Clone)]
pub struct ResourceUri {
    pub href: String,
}

impl ResourceUri {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

/// Per-variable validation function for template resources.
///
/// Receives the percent-decoded variable value; returns the (possibly
/// coerced) value, or a message describing the failure.
pub type VariableValidator =
    Arc<dyn Fn(&str) -> std::result::Result<Value, String> + Send + Sync>;

/// Common variable validators.
pub mod validators {
    use super::*;
    use regex::Regex;

    /// Accept values matching a regex; `description` names the expected
    /// format in the failure message.
    pub fn pattern(
        re: &str,
        description: impl Into<String>,
    ) -> std::result::Result<VariableValidator, regex::Error> {
        let regex = Regex::new(re)?;
        let description = description.into();
        Ok(Arc::new(move |value: &str| {
            if regex.is_match(value) {
                Ok(Value::String(value.to_string()))
            } else {
                Err(format!("expected {}", description))
            }
        }))
    }

    /// Accept integers, coercing the value to a JSON number.
    pub fn integer() -> VariableValidator {
        Arc::new(|value: &str| {
            value
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "expected an integer".to_string())
        })
    }
}

/// Resource handler trait for static resources
pub trait ResourceHandler: Send + Sync {
    fn read(
        &self,
        uri: ResourceUri,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<ReadResourceResult>>;
}

/// Handler trait for template resources; receives the validated variables.
pub trait ResourceTemplateHandler: Send + Sync {
    fn read(
        &self,
        uri: ResourceUri,
        vars: HashMap<String, Value>,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<ReadResourceResult>>;
}

/// A static resource with a fixed URI
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    handler: Arc<dyn ResourceHandler>,
}

impl Resource {
    /// Create a new resource builder
    pub fn builder(uri: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(uri)
    }

    /// Get the resource definition for resources/list
    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    /// Read the resource
    pub fn read(&self, ctx: RequestContext) -> BoxFuture<'static, Result<ReadResourceResult>> {
        self.handler.read(ResourceUri::new(self.uri.clone()), ctx)
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// A parameterized resource matched by URI template
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    template: UriTemplate,
    validators: HashMap<String, VariableValidator>,
    handler: Arc<dyn ResourceTemplateHandler>,
}

impl ResourceTemplate {
    /// Create a new resource template builder
    pub fn builder(uri_template: impl Into<String>) -> ResourceTemplateBuilder {
        ResourceTemplateBuilder::new(uri_template)
    }

    /// Get the template definition for resources/templates/list
    pub fn definition(&self) -> ResourceTemplateDefinition {
        ResourceTemplateDefinition {
            uri_template: self.uri_template.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    /// Check whether a URI matches this template, extracting raw variables.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        self.template.match_uri(uri)
    }

    /// Run per-variable validators over matched values, in template order.
    ///
    /// Values without a validator pass through as strings.
    pub(crate) fn validate_vars(
        &self,
        mut raw: HashMap<String, String>,
    ) -> std::result::Result<HashMap<String, Value>, RpcError> {
        let mut validated = HashMap::with_capacity(raw.len());
        for name in self.template.variables() {
            let Some(value) = raw.remove(name) else {
                continue;
            };
            let value = match self.validators.get(name) {
                Some(validator) => validator(&value).map_err(|msg| {
                    RpcError::invalid_params(format!(
                        "Validation failed for parameter '{}': {}",
                        name, msg
                    ))
                })?,
                None => Value::String(value),
            };
            validated.insert(name.clone(), value);
        }
        Ok(validated)
    }

    /// Read a resource at a URI matched by this template
    pub fn read(
        &self,
        uri: ResourceUri,
        vars: HashMap<String, Value>,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<ReadResourceResult>> {
        self.handler.read(uri, vars, ctx)
    }
}

impl std::fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("uri_template", &self.uri_template)
            .field("name", &self.name)
            .field("variables", &self.template.variables())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder API
// =============================================================================

/// Builder for creating static resources
pub struct ResourceBuilder {
    uri: String,
    name: Option<String>,
    description: Option<String>,
    mime_type: Option<String>,
}

impl ResourceBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            description: None,
            mime_type: None,
        }
    }

    /// Set the resource name (defaults to the URI)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the resource description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type of the resource
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the handler function for reading the resource
    pub fn handler<F, Fut>(self, handler: F) -> Resource
    where
        F: Fn(ResourceUri, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult>> + Send + 'static,
    {
        Resource {
            name: self.name.unwrap_or_else(|| self.uri.clone()),
            uri: self.uri,
            description: self.description,
            mime_type: self.mime_type,
            handler: Arc::new(FnResourceHandler { handler }),
        }
    }

    /// Create a static text resource (convenience method)
    pub fn text(self, content: impl Into<String>) -> Resource {
        let content = content.into();
        let mime_type = self.mime_type.clone();
        self.handler(move |uri, _ctx| {
            let content = content.clone();
            let mime_type = mime_type.clone();
            async move {
                let mut item = ResourceContent::text(uri.href, content);
                item.mime_type = mime_type;
                Ok(ReadResourceResult {
                    contents: vec![item],
                })
            }
        })
    }

    /// Create a static JSON resource (convenience method)
    pub fn json(mut self, value: Value) -> Resource {
        self.mime_type = Some("application/json".to_string());
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
        self.text(text)
    }
}

/// Builder for creating resource templates
pub struct ResourceTemplateBuilder {
    uri_template: String,
    name: Option<String>,
    description: Option<String>,
    mime_type: Option<String>,
    validators: HashMap<String, VariableValidator>,
}

impl ResourceTemplateBuilder {
    pub fn new(uri_template: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: None,
            description: None,
            mime_type: None,
            validators: HashMap::new(),
        }
    }

    /// Set the template name (defaults to the template string)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the template description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type hint for resources from this template
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach a validator for one template variable
    pub fn variable_validator<F>(mut self, variable: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.validators.insert(variable.into(), Arc::new(validator));
        self
    }

    /// Attach a prebuilt [`VariableValidator`]
    pub fn validator(mut self, variable: impl Into<String>, validator: VariableValidator) -> Self {
        self.validators.insert(variable.into(), validator);
        self
    }

    /// Set the handler and compile the template.
    ///
    /// Fails on malformed templates (duplicate variables, unterminated or
    /// empty braces).
    pub fn handler<F, Fut>(
        self,
        handler: F,
    ) -> std::result::Result<ResourceTemplate, TemplateError>
    where
        F: Fn(ResourceUri, HashMap<String, Value>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult>> + Send + 'static,
    {
        let template = UriTemplate::compile(&self.uri_template)?;
        Ok(ResourceTemplate {
            name: self.name.unwrap_or_else(|| self.uri_template.clone()),
            uri_template: self.uri_template,
            description: self.description,
            mime_type: self.mime_type,
            template,
            validators: self.validators,
            handler: Arc::new(FnTemplateHandler { handler }),
        })
    }
}

// =============================================================================
// Handler implementations
// =============================================================================

struct FnResourceHandler<F> {
    handler: F,
}

impl<F, Fut> ResourceHandler for FnResourceHandler<F>
where
    F: Fn(ResourceUri, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ReadResourceResult>> + Send + 'static,
{
    fn read(
        &self,
        uri: ResourceUri,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<ReadResourceResult>> {
        Box::pin((self.handler)(uri, ctx))
    }
}

struct FnTemplateHandler<F> {
    handler: F,
}

impl<F, Fut> ResourceTemplateHandler for FnTemplateHandler<F>
where
    F: Fn(ResourceUri, HashMap<String, Value>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ReadResourceResult>> + Send + 'static,
{
    fn read(
        &self,
        uri: ResourceUri,
        vars: HashMap<String, Value>,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<ReadResourceResult>> {
        Box::pin((self.handler)(uri, vars, ctx))
    }
}
