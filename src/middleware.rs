//! Middleware pipeline for the dispatcher
//!
//! Middleware wrap every dispatch in registration order, onion style: for
//! middlewares `[A, B]` the trace is `A-pre, B-pre, tail, B-post, A-post`.
//! The continuation is index-driven rather than built from recursive
//! closures, and [`Next::run`] consumes the continuation, so a middleware
//! can invoke the rest of the chain at most once by construction.
//!
//! A middleware that returns without running `next` suppresses the tail:
//! the dispatcher then answers requests with an internal "No response
//! generated" error and drops notifications silently.
//!
//! ```rust,ignore
//! let server = McpServer::new("srv", "1.0.0").middleware(middleware::from_fn(
//!     |ctx: RequestContext, next: Next| async move {
//!         tracing::debug!(method = ?ctx.method(), "dispatch start");
//!         let outcome = next.run(&ctx).await;
//!         tracing::debug!(ok = outcome.is_ok(), "dispatch end");
//!         outcome
//!     },
//! ));
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::Result;

/// A dispatch middleware.
///
/// Implementations receive the request context and the continuation for the
/// rest of the chain. Errors propagate to the dispatcher, which maps them
/// onto the wire for requests and swallows them for notifications.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, next: Next) -> Result<()>;
}

/// The terminal stage of the chain; resolves and runs the method handler.
pub(crate) type Tail = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Continuation over the remaining middleware chain, ending at the dispatch
/// tail.
///
/// `run` consumes the value; a second invocation is unrepresentable.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    tail: Tail,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>, tail: Tail) -> Self {
        Self {
            chain,
            index: 0,
            tail,
        }
    }

    /// Run the rest of the chain.
    pub async fn run(mut self, ctx: &RequestContext) -> Result<()> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(ctx, self).await
            }
            None => (self.tail)(ctx.clone()).await,
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.index))
            .finish_non_exhaustive()
    }
}

/// Middleware backed by an async closure.
///
/// Created by [`from_fn`].
pub struct FnMiddleware {
    f: Box<dyn Fn(RequestContext, Next) -> BoxFuture<'static, Result<()>> + Send + Sync>,
}

#[async_trait]
impl Middleware for FnMiddleware {
    async fn handle(&self, ctx: &RequestContext, next: Next) -> Result<()> {
        (self.f)(ctx.clone(), next).await
    }
}

/// Adapt an async closure `(ctx, next) -> Result<()>` into a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnMiddleware {
        f: Box::new(move |ctx, next| Box::pin(f(ctx, next))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::JsonRpcMessage;
    use std::sync::Mutex;

    fn test_context() -> RequestContext {
        RequestContext::new(JsonRpcMessage::request(1, "ping"), None, None, None)
    }

    fn trace_middleware(trace: Arc<Mutex<Vec<String>>>, label: &'static str) -> FnMiddleware {
        from_fn(move |ctx: RequestContext, next: Next| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push(format!("{label}-pre"));
                let outcome = next.run(&ctx).await;
                trace.lock().unwrap().push(format!("{label}-post"));
                outcome
            }
        })
    }

    fn recording_tail(trace: Arc<Mutex<Vec<String>>>) -> Tail {
        Arc::new(move |_ctx: RequestContext| {
            let trace = trace.clone();
            Box::pin(async move {
                trace.lock().unwrap().push("tail".to_string());
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_onion_ordering() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Arc<dyn Middleware>]> = vec![
            Arc::new(trace_middleware(trace.clone(), "A")) as Arc<dyn Middleware>,
            Arc::new(trace_middleware(trace.clone(), "B")),
        ]
        .into();

        let ctx = test_context();
        Next::new(chain, recording_tail(trace.clone()))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["A-pre", "B-pre", "tail", "B-post", "A-post"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_runs_tail() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Arc<dyn Middleware>]> = Vec::new().into();

        let ctx = test_context();
        Next::new(chain, recording_tail(trace.clone()))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["tail"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_tail() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Arc<dyn Middleware>]> =
            vec![
                Arc::new(from_fn(|_ctx: RequestContext, _next: Next| async move {
                    // Drops `next` without running it.
                    Ok(())
                })) as Arc<dyn Middleware>,
            ]
            .into();

        let ctx = test_context();
        Next::new(chain, recording_tail(trace.clone()))
            .run(&ctx)
            .await
            .unwrap();

        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_propagates_through_chain() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Arc<dyn Middleware>]> =
            vec![Arc::new(trace_middleware(trace.clone(), "A")) as Arc<dyn Middleware>].into();

        let tail: Tail = Arc::new(|_ctx| {
            Box::pin(async { Err(Error::handler("tail failed")) })
        });

        let ctx = test_context();
        let outcome = Next::new(chain, tail).run(&ctx).await;
        assert!(outcome.is_err());
        // Post-tail middleware code still observed the error path.
        assert_eq!(*trace.lock().unwrap(), vec!["A-pre", "A-post"]);
    }
}
