//! Per-request context for MCP handlers
//!
//! A [`RequestContext`] is built for every dispatched message and dropped
//! when the dispatch completes. It carries the raw message, the session and
//! auth identity supplied by the transport, a freely mutable state bag for
//! middleware, the response slot the dispatch tail writes into, and - when
//! the client asked for it - a progress reporter bound to the originating
//! request.
//!
//! Contexts are cheap to clone (the inner state is shared), so handlers and
//! middleware can move them into spawned futures freely.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, ProgressParams, ProgressToken,
    RequestId, notifications,
};
use crate::schema::ArgumentValidator;

/// Transport-supplied callback for delivering server-to-client
/// notifications.
///
/// The sender is wired once per server
/// ([`McpServer::set_notification_sender`](crate::McpServer::set_notification_sender))
/// and borrowed by every dispatch for its lifetime.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        session_id: Option<&str>,
        notification: JsonRpcNotification,
        options: NotificationOptions,
    ) -> Result<()>;
}

/// Delivery options attached to an outbound notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    /// The request this notification relates to, so clients can reassociate
    /// it under interleaved dispatch.
    pub related_request_id: Option<RequestId>,
}

/// Information about the authenticated caller, passed through opaquely from
/// the transport's auth middleware.
#[derive(Debug, Clone, Default)]
pub struct AuthInfo {
    /// Client/user identifier
    pub subject: Option<String>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Additional claims or metadata
    pub claims: Option<Value>,
}

impl AuthInfo {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            scopes: Vec::new(),
            claims: None,
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    pub fn with_claims(mut self, claims: Value) -> Self {
        self.claims = Some(claims);
        self
    }
}

/// A type-map for request-scoped state shared along the middleware chain.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast().ok())
            .map(|prev| *prev)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Progress sender bound to one request.
///
/// Exists only when the request carried a `_meta.progressToken`, the
/// transport wired a [`NotificationSender`], and a session id is known.
/// Emits `notifications/progress` tagged with the originating request id.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: Arc<dyn NotificationSender>,
    session_id: String,
    token: ProgressToken,
    related_request_id: Option<RequestId>,
}

impl ProgressReporter {
    pub(crate) fn new(
        sender: Arc<dyn NotificationSender>,
        session_id: String,
        token: ProgressToken,
        related_request_id: Option<RequestId>,
    ) -> Self {
        Self {
            sender,
            session_id,
            token,
            related_request_id,
        }
    }

    /// The progress token supplied by the client.
    pub fn token(&self) -> &ProgressToken {
        &self.token
    }

    /// Send a progress update to the client.
    pub async fn send(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<&str>,
    ) -> Result<()> {
        let params = ProgressParams {
            progress_token: self.token.clone(),
            progress,
            total,
            message: message.map(str::to_string),
        };
        let notification = JsonRpcNotification::new(notifications::PROGRESS)
            .with_params(serde_json::to_value(&params)?);
        self.sender
            .send(
                Some(&self.session_id),
                notification,
                NotificationOptions {
                    related_request_id: self.related_request_id.clone(),
                },
            )
            .await
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("session_id", &self.session_id)
            .field("token", &self.token)
            .field("related_request_id", &self.related_request_id)
            .finish_non_exhaustive()
    }
}

/// Context for one dispatch, shared by middleware and the handler.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    message: JsonRpcMessage,
    session_id: Option<String>,
    auth_info: Option<AuthInfo>,
    progress: Option<ProgressReporter>,
    state: Mutex<Extensions>,
    response: Mutex<Option<JsonRpcResponse>>,
}

impl RequestContext {
    pub(crate) fn new(
        message: JsonRpcMessage,
        session_id: Option<String>,
        auth_info: Option<AuthInfo>,
        progress: Option<ProgressReporter>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                message,
                session_id,
                auth_info,
                progress,
                state: Mutex::new(Extensions::new()),
                response: Mutex::new(None),
            }),
        }
    }

    /// The raw inbound message.
    pub fn message(&self) -> &JsonRpcMessage {
        &self.inner.message
    }

    /// The request method, when present on the envelope.
    pub fn method(&self) -> Option<&str> {
        self.inner.message.method.as_deref()
    }

    /// The raw request params.
    pub fn params(&self) -> Option<&Value> {
        self.inner.message.params.as_ref()
    }

    /// The request id. `None` for notifications.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.inner.message.id.as_ref()
    }

    /// True when this dispatch will never produce a response.
    pub fn is_notification(&self) -> bool {
        self.inner.message.is_notification()
    }

    /// The transport session this message arrived on, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.inner.session_id.as_deref()
    }

    /// Authenticated-caller information, if the transport supplied it.
    pub fn auth_info(&self) -> Option<&AuthInfo> {
        self.inner.auth_info.as_ref()
    }

    /// The bound progress reporter, when the request can receive progress.
    pub fn progress(&self) -> Option<&ProgressReporter> {
        self.inner.progress.as_ref()
    }

    /// Report progress to the client.
    ///
    /// A no-op when no progress token, sender, or session is available.
    pub async fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<&str>,
    ) -> Result<()> {
        match &self.inner.progress {
            Some(reporter) => reporter.send(progress, total, message).await,
            None => Ok(()),
        }
    }

    /// Run a validator over a value, mapping failures to `INVALID_PARAMS`.
    pub fn validate(&self, validator: &ArgumentValidator, value: Value) -> Result<Value> {
        validator(value).map_err(Error::Rpc)
    }

    /// Store request-scoped state, returning any previous value of the type.
    pub fn insert_state<T: Send + Sync + 'static>(&self, value: T) -> Option<T> {
        self.inner.state.lock().unwrap().insert(value)
    }

    /// Fetch a clone of previously stored state.
    pub fn state<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.state.lock().unwrap().get::<T>().cloned()
    }

    /// Remove previously stored state.
    pub fn remove_state<T: 'static>(&self) -> Option<T> {
        self.inner.state.lock().unwrap().remove::<T>()
    }

    /// Record the response for this dispatch. The dispatch tail sets this;
    /// post-`next` middleware may replace it.
    pub fn set_response(&self, response: JsonRpcResponse) {
        *self.inner.response.lock().unwrap() = Some(response);
    }

    /// The response recorded so far, if any.
    pub fn response(&self) -> Option<JsonRpcResponse> {
        self.inner.response.lock().unwrap().clone()
    }

    pub(crate) fn take_response(&self) -> Option<JsonRpcResponse> {
        self.inner.response.lock().unwrap().take()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method())
            .field("request_id", &self.request_id())
            .field("session_id", &self.session_id())
            .field("has_progress", &self.inner.progress.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn request_context() -> RequestContext {
        RequestContext::new(
            JsonRpcMessage::request(1, "tools/call").with_params(json!({"name": "echo"})),
            Some("session-1".to_string()),
            None,
            None,
        )
    }

    #[test]
    fn test_accessors() {
        let ctx = request_context();
        assert_eq!(ctx.method(), Some("tools/call"));
        assert_eq!(ctx.request_id(), Some(&RequestId::Number(1)));
        assert_eq!(ctx.session_id(), Some("session-1"));
        assert!(!ctx.is_notification());
        assert!(ctx.progress().is_none());
    }

    #[test]
    fn test_state_is_shared_across_clones() {
        let ctx = request_context();
        let clone = ctx.clone();

        ctx.insert_state(42u32);
        assert_eq!(clone.state::<u32>(), Some(42));

        assert_eq!(clone.remove_state::<u32>(), Some(42));
        assert_eq!(ctx.state::<u32>(), None);
    }

    #[test]
    fn test_insert_state_returns_previous() {
        let ctx = request_context();
        assert_eq!(ctx.insert_state("a".to_string()), None);
        assert_eq!(ctx.insert_state("b".to_string()), Some("a".to_string()));
    }

    #[test]
    fn test_response_slot() {
        let ctx = request_context();
        assert!(ctx.response().is_none());

        ctx.set_response(JsonRpcResponse::result(RequestId::Number(1), json!({})));
        assert!(ctx.response().is_some());
        assert!(ctx.take_response().is_some());
        assert!(ctx.response().is_none());
    }

    #[test]
    fn test_validate_maps_failure() {
        let ctx = request_context();
        let validator: ArgumentValidator = Arc::new(|v: Value| {
            if v.get("ok").is_some() {
                Ok(v)
            } else {
                Err(crate::error::RpcError::invalid_params("missing ok"))
            }
        });

        assert!(ctx.validate(&validator, json!({"ok": true})).is_ok());
        let err = ctx.validate(&validator, json!({})).unwrap_err();
        match err {
            Error::Rpc(rpc) => assert_eq!(rpc.code, -32602),
            other => panic!("unexpected error: {other}"),
        }
    }

    struct RecordingSender {
        sent: StdMutex<Vec<(Option<String>, JsonRpcNotification, NotificationOptions)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(
            &self,
            session_id: Option<&str>,
            notification: JsonRpcNotification,
            options: NotificationOptions,
        ) -> Result<()> {
            self.sent.lock().unwrap().push((
                session_id.map(str::to_string),
                notification,
                options,
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_progress_reporter_sends_bound_notification() {
        let sender = Arc::new(RecordingSender {
            sent: StdMutex::new(Vec::new()),
        });
        let reporter = ProgressReporter::new(
            sender.clone(),
            "session-1".to_string(),
            ProgressToken::String("tok".to_string()),
            Some(RequestId::Number(9)),
        );

        reporter.send(50.0, Some(100.0), Some("Halfway")).await.unwrap();

        let sent = sender.sent.lock().unwrap();
        let (session, notification, options) = &sent[0];
        assert_eq!(session.as_deref(), Some("session-1"));
        assert_eq!(notification.method, notifications::PROGRESS);
        let params = notification.params.as_ref().unwrap();
        assert_eq!(params["progressToken"], "tok");
        assert_eq!(params["progress"], 50.0);
        assert_eq!(params["message"], "Halfway");
        assert_eq!(options.related_request_id, Some(RequestId::Number(9)));
    }

    #[tokio::test]
    async fn test_report_progress_without_reporter_is_noop() {
        let ctx = request_context();
        ctx.report_progress(10.0, None, None).await.unwrap();
    }
}
