//! Before hooks.

use super::Decorator;
use crate::error::Result;
use crate::handler::{BoxFuture, Handler};
use crate::request::Request;
use std::future::Future;
use std::sync::Arc;

/// Async hook run before the wrapped handler
pub type BeforeHook<S> = Arc<dyn Fn(Request, Arc<S>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Runs a hook with the request and service before the wrapped handler
///
/// An `Err` from the hook aborts the chain; the handler never runs.
pub struct Before<S> {
    hook: BeforeHook<S>,
}

impl<S> Before<S>
where
    S: Send + Sync + 'static,
{
    /// Wrap an async function as a before hook
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(Request, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            hook: Arc::new(move |req, service| Box::pin(hook(req, service))),
        }
    }
}

impl<S> Decorator<S> for Before<S>
where
    S: Send + Sync + 'static,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let hook = Arc::clone(&self.hook);
        Ok(Arc::new(move |service, req| {
            let hook = Arc::clone(&hook);
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                hook(req.clone(), Arc::clone(&service)).await?;
                inner(service, req).await
            })
        }))
    }

    fn name(&self) -> &'static str {
        "Before"
    }
}
