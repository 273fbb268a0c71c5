//! Error types for mcp-dispatch
//!
//! ## JSON-RPC Error Codes
//!
//! Standard JSON-RPC 2.0 error codes are defined in the specification:
//! <https://www.jsonrpc.org/specification#error_object>
//!
//! | Code   | Message          | Meaning                                      |
//! |--------|------------------|----------------------------------------------|
//! | -32700 | Parse error      | Invalid JSON was received (transport concern) |
//! | -32600 | Invalid Request  | The JSON sent is not a valid Request          |
//! | -32601 | Method not found | Unknown method, tool name, or resource URI    |
//! | -32602 | Invalid params   | Params shape or validator failure             |
//! | -32603 | Internal error   | Catch-all, not-implemented, no response       |
//!
//! The server error range (-32000 to -32099) is used for one MCP-specific
//! condition: `-32000` signals a protocol-version mismatch on `initialize`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::uri_template::TemplateError;

/// Type-erased error type at handler boundaries.
///
/// This is the standard error type in the tower ecosystem; handlers that
/// fail with anything other than an [`RpcError`] are coerced into an
/// internal error when the response is built.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Standard JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Invalid JSON was received
    ParseError = -32700,
    /// The JSON sent is not a valid Request object
    InvalidRequest = -32600,
    /// The method does not exist / is not available
    MethodNotFound = -32601,
    /// Invalid method parameter(s)
    InvalidParams = -32602,
    /// Internal JSON-RPC error
    InternalError = -32603,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Server-range code returned when the client requests an unsupported
/// protocol version during `initialize`.
pub const PROTOCOL_VERSION_MISMATCH: i32 = -32000;

/// JSON-RPC error object.
///
/// The only first-class error kind in the dispatch core: it serializes
/// verbatim as the `error` member of a JSON-RPC response. Everything else
/// is foreign and coerced into [`ErrorCode::InternalError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Unknown request method. Carries no payload; used when the request
    /// envelope itself has no usable `method` member.
    pub fn method_missing() -> Self {
        Self::new(ErrorCode::MethodNotFound, "Method not found")
    }

    /// Unknown method or unknown tool by name, with the name in `data.method`.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, "Method not found")
            .with_data(json!({ "method": method }))
    }

    /// Unknown resource URI, with the URI in `data.uri`.
    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, "Method not found").with_data(json!({ "uri": uri }))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// A built-in method that is advertised by the protocol but deliberately
    /// unimplemented by this core (subscriptions, completion).
    pub fn not_implemented(method: &str) -> Self {
        Self::new(ErrorCode::InternalError, "Not implemented")
            .with_data(json!({ "method": method }))
    }

    /// Rejection of `initialize` when the requested protocol version does
    /// not match the single supported version.
    pub fn protocol_version_mismatch(supported: &str, requested: &str) -> Self {
        Self {
            code: PROTOCOL_VERSION_MISMATCH,
            message: format!("Unsupported protocol version: {}", requested),
            data: Some(json!({
                "supportedVersion": supported,
                "requestedVersion": requested,
            })),
        }
    }
}

/// mcp-dispatch error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A JSON-RPC error that maps onto the wire verbatim.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// URI template compilation failure at registration time.
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Foreign handler failure; becomes an internal error on the wire.
    #[error("handler error: {0}")]
    Handler(BoxError),
}

impl Error {
    /// Create a handler error from any `Display` type.
    ///
    /// Useful in a `map_err` chain inside tool or resource handlers:
    ///
    /// ```rust
    /// # use mcp_dispatch::Error;
    /// # fn example() -> Result<(), Error> {
    /// let result: Result<(), std::io::Error> = Err(std::io::Error::other("oops"));
    /// result.map_err(Error::handler)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn handler<E: std::fmt::Display>(err: E) -> Self {
        Error::Handler(err.to_string().into())
    }

    /// Map this error to the JSON-RPC error object that represents it.
    ///
    /// [`Error::Rpc`] passes through unchanged; everything else is wrapped
    /// as an internal error with the message preserved under `data.message`.
    pub fn into_rpc(self) -> RpcError {
        match self {
            Error::Rpc(err) => err,
            other => {
                let message = other.to_string();
                RpcError::internal_error("Internal error")
                    .with_data(json!({ "message": message }))
            }
        }
    }
}

/// Result type alias for mcp-dispatch
pub type Result<T> = std::result::Result<T, Error>;
