//! # Handler Types
//!
//! A handler is a plain value: a shared async function from the owning
//! service and a request to a reply. Decorators take one and return another
//! of the same shape, so a decorated endpoint is just nested closures.

use crate::error::Result;
use crate::request::Request;
use crate::response::Reply;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by every handler
pub type HandlerFuture = BoxFuture<'static, Result<Reply>>;

/// Handler bound to service type `S` (receives the instance per call)
pub type Handler<S> = Arc<dyn Fn(Arc<S>, Request) -> HandlerFuture + Send + Sync>;

/// Handler already bound to a service instance
pub type BoundHandler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Box an async function into a `Handler<S>`
pub fn handler<S, F, Fut>(f: F) -> Handler<S>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    Arc::new(move |service, req| Box::pin(f(service, req)))
}

/// Bind a `Handler<S>` to one service instance
pub fn bind<S>(handler: Handler<S>, service: Arc<S>) -> BoundHandler
where
    S: Send + Sync + 'static,
{
    Arc::new(move |req| handler(Arc::clone(&service), req))
}
