//! Schema resolution for tool and prompt inputs
//!
//! Registration accepts heterogeneous schema sources and resolves them into
//! one uniform shape: a JSON Schema document to advertise plus an optional
//! validation function to run over raw arguments. The tagged
//! [`SchemaSource`] keeps the two kinds apart until resolution so call
//! sites never have to type-sniff.
//!
//! The typed path ([`SchemaSource::typed`]) derives both halves from a
//! `serde`-deserializable type: `schemars` generates the advertised schema
//! and deserialization doubles as validation.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::RpcError;
use crate::protocol::PromptArgument;

/// Validation function run over raw request arguments.
///
/// Returns the validated value on success; failures surface to the client
/// as `INVALID_PARAMS`.
pub type ArgumentValidator =
    Arc<dyn Fn(Value) -> Result<Value, RpcError> + Send + Sync>;

/// Embedder-supplied hook converting the schema generated for a
/// validator-backed registration into the document to advertise.
pub type SchemaAdapter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// The schema half of a tool or prompt registration.
pub enum SchemaSource {
    /// An explicit JSON Schema document, advertised verbatim. Arguments are
    /// passed to the handler unvalidated.
    Document(Value),
    /// An opaque validation function plus the schema to advertise for it
    /// (`{"type": "object"}` when none was supplied).
    Validator {
        validate: ArgumentValidator,
        advertised: Option<Value>,
    },
}

impl SchemaSource {
    /// An explicit JSON Schema document.
    pub fn document(schema: Value) -> Self {
        SchemaSource::Document(schema)
    }

    /// An opaque validator with no introspectable schema.
    pub fn validator<F>(validate: F) -> Self
    where
        F: Fn(Value) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        SchemaSource::Validator {
            validate: Arc::new(validate),
            advertised: None,
        }
    }

    /// An opaque validator paired with the schema to advertise.
    pub fn validator_with_schema<F>(validate: F, advertised: Value) -> Self
    where
        F: Fn(Value) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        SchemaSource::Validator {
            validate: Arc::new(validate),
            advertised: Some(advertised),
        }
    }

    /// A typed source: deserialization into `T` validates the arguments and
    /// `schemars` generates the advertised schema.
    pub fn typed<T>() -> Self
    where
        T: DeserializeOwned + JsonSchema + 'static,
    {
        let advertised = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or_else(|_| json!({ "type": "object" }));
        SchemaSource::Validator {
            validate: Arc::new(|raw: Value| match serde_json::from_value::<T>(raw.clone()) {
                Ok(_) => Ok(raw),
                Err(e) => Err(RpcError::invalid_params(format!("Invalid arguments: {}", e))),
            }),
            advertised: Some(advertised),
        }
    }
}

impl std::fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaSource::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
            SchemaSource::Validator { advertised, .. } => f
                .debug_struct("Validator")
                .field("advertised", advertised)
                .finish_non_exhaustive(),
        }
    }
}

/// Uniform result of resolving a [`SchemaSource`].
#[derive(Clone)]
pub struct ResolvedSchema {
    /// The JSON Schema advertised to clients. Always an object document.
    pub input_schema: Value,
    /// Validator to run over raw arguments before the handler, if any.
    pub validator: Option<ArgumentValidator>,
    /// True when this registration came from a validator; the server-level
    /// schema adapter only rewrites these.
    pub(crate) from_validator: bool,
}

impl std::fmt::Debug for ResolvedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSchema")
            .field("input_schema", &self.input_schema)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Resolve a schema source into the uniform `(schema, validator)` pair.
///
/// A missing source advertises `{"type": "object"}` with no validation.
pub fn resolve(source: Option<SchemaSource>) -> ResolvedSchema {
    match source {
        None => ResolvedSchema {
            input_schema: json!({ "type": "object" }),
            validator: None,
            from_validator: false,
        },
        Some(SchemaSource::Document(doc)) => ResolvedSchema {
            input_schema: doc,
            validator: None,
            from_validator: false,
        },
        Some(SchemaSource::Validator {
            validate,
            advertised,
        }) => ResolvedSchema {
            input_schema: advertised.unwrap_or_else(|| json!({ "type": "object" })),
            validator: Some(validate),
            from_validator: true,
        },
    }
}

/// Derive prompt arguments from a JSON Schema object.
///
/// One argument per top-level property, in property insertion order, with
/// `required` lifted from the schema's `required` array. Non-object schemas
/// yield no arguments.
pub fn prompt_arguments(schema: &Value) -> Vec<PromptArgument> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Vec::new();
    }
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| PromptArgument {
            name: name.clone(),
            description: prop
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            required: required.contains(&name.as_str()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoInput {
        /// Message to echo back
        message: String,
        #[allow(dead_code)]
        count: Option<i64>,
    }

    #[test]
    fn test_resolve_missing_source() {
        let resolved = resolve(None);
        assert_eq!(resolved.input_schema, json!({ "type": "object" }));
        assert!(resolved.validator.is_none());
    }

    #[test]
    fn test_resolve_document_is_identity() {
        let doc = json!({
            "type": "object",
            "properties": { "m": { "type": "string" } },
            "required": ["m"]
        });
        let resolved = resolve(Some(SchemaSource::document(doc.clone())));
        assert_eq!(resolved.input_schema, doc);
        assert!(resolved.validator.is_none());
        assert!(!resolved.from_validator);
    }

    #[test]
    fn test_resolve_bare_validator_defaults_schema() {
        let resolved = resolve(Some(SchemaSource::validator(Ok)));
        assert_eq!(resolved.input_schema, json!({ "type": "object" }));
        assert!(resolved.validator.is_some());
        assert!(resolved.from_validator);
    }

    #[test]
    fn test_typed_source_advertises_object_schema() {
        let resolved = resolve(Some(SchemaSource::typed::<EchoInput>()));
        assert_eq!(
            resolved.input_schema.get("type").and_then(Value::as_str),
            Some("object")
        );
        assert!(
            resolved.input_schema["properties"]
                .as_object()
                .unwrap()
                .contains_key("message")
        );
    }

    #[test]
    fn test_typed_validator_accepts_and_rejects() {
        let resolved = resolve(Some(SchemaSource::typed::<EchoInput>()));
        let validate = resolved.validator.unwrap();

        let ok = validate(json!({ "message": "hi" })).unwrap();
        assert_eq!(ok, json!({ "message": "hi" }));

        let err = validate(json!({ "message": 42 })).unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn test_prompt_arguments_from_object_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "body": { "type": "string" }
            },
            "required": ["title"]
        });
        let args = prompt_arguments(&schema);
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, "title");
        assert_eq!(args[0].description.as_deref(), Some("Document title"));
        assert!(args[0].required);
        assert_eq!(args[1].name, "body");
        assert!(!args[1].required);
    }

    #[test]
    fn test_prompt_arguments_non_object_schema() {
        assert!(prompt_arguments(&json!({ "type": "string" })).is_empty());
        assert!(prompt_arguments(&json!(true)).is_empty());
    }

    #[test]
    fn test_prompt_arguments_object_without_properties() {
        assert!(prompt_arguments(&json!({ "type": "object" })).is_empty());
    }
}
