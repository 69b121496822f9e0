//! After hooks.

use super::Decorator;
use crate::error::Result;
use crate::handler::{BoxFuture, Handler};
use crate::request::Request;
use crate::response::Reply;
use std::future::Future;
use std::sync::Arc;

/// Async hook run after the wrapped handler
///
/// Returning `Some(reply)` replaces the handler's reply; `None` keeps it.
pub type AfterHook<S> =
    Arc<dyn Fn(Request, Arc<Reply>, Arc<S>) -> BoxFuture<'static, Result<Option<Reply>>> + Send + Sync>;

/// Runs a hook on the wrapped handler's reply
///
/// The reply is frozen behind an `Arc` that the chain keeps a clone of, so a
/// hook can read it but only change the outcome by returning a new reply.
pub struct After<S> {
    hook: AfterHook<S>,
}

impl<S> After<S>
where
    S: Send + Sync + 'static,
{
    /// Wrap an async function as an after hook
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(Request, Arc<Reply>, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Reply>>> + Send + 'static,
    {
        Self {
            hook: Arc::new(move |req, reply, service| Box::pin(hook(req, reply, service))),
        }
    }
}

impl<S> Decorator<S> for After<S>
where
    S: Send + Sync + 'static,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let hook = Arc::clone(&self.hook);
        Ok(Arc::new(move |service, req| {
            let hook = Arc::clone(&hook);
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let reply = Arc::new(inner(Arc::clone(&service), req.clone()).await?);
                match hook(req, Arc::clone(&reply), service).await? {
                    Some(replacement) => Ok(replacement),
                    None => Ok(Arc::try_unwrap(reply).unwrap_or_else(|shared| (*shared).clone())),
                }
            })
        }))
    }

    fn name(&self) -> &'static str {
        "After"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use crate::response::Response;
    use crate::route::Method;
    use serde_json::json;

    struct Users;

    fn users() -> Handler<Users> {
        handler(|_svc: Arc<Users>, _req: Request| async {
            Ok(Reply::from(Response::ok(json!({ "users": [] }))))
        })
    }

    fn get() -> Request {
        Request::builder(Method::Get, "/users").build()
    }

    #[tokio::test]
    async fn test_after_replaces_reply() {
        let hook = After::new(|_req: Request, reply: Arc<Reply>, _svc: Arc<Users>| async move {
            let mut body = reply.body().cloned().unwrap_or_default();
            body["metadata"] = json!({ "count": 0 });
            Ok(Some(Reply::from(Response::new(reply.status()).with_body(body))))
        });
        let wrapped = hook.wrap(users()).unwrap();

        let reply = wrapped(Arc::new(Users), get()).await.unwrap();
        assert_eq!(reply.body(), Some(&json!({ "users": [], "metadata": { "count": 0 } })));
    }

    #[tokio::test]
    async fn test_after_cannot_mutate_in_place() {
        let hook = After::new(|_req: Request, mut reply: Arc<Reply>, _svc: Arc<Users>| async move {
            assert!(Arc::get_mut(&mut reply).is_none());
            Ok(None)
        });
        let wrapped = hook.wrap(users()).unwrap();

        let reply = wrapped(Arc::new(Users), get()).await.unwrap();
        assert_eq!(reply.body(), Some(&json!({ "users": [] })));
    }

    #[tokio::test]
    async fn test_handler_error_skips_after() {
        let hook = After::new(|req: Request, _reply: Arc<Reply>, _svc: Arc<Users>| async move {
            req.state().set("after_ran", true);
            Ok(None)
        });
        let wrapped = hook
            .wrap(handler(|_svc: Arc<Users>, _req: Request| async {
                Err(crate::error::Error::http(500, "boom"))
            }))
            .unwrap();

        let req = get();
        assert!(wrapped(Arc::new(Users), req.clone()).await.is_err());
        assert!(!req.state().contains("after_ran"));
    }
}
