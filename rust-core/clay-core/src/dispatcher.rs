//! # Request Dispatcher
//!
//! Middleware that routes host requests to a service's composed endpoints.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Matches, invokes and writes back; compilation lives in `router`
//! - **I**: Forwarding sees services only through [`ServiceEntry`]
//! - **D**: Talks to the host only through `Context` and `Next`
//!
//! ## Flow
//!
//! 1. Register the service in the request's [`ServiceDirectory`] and under
//!    `services.<key>` in the JSON state
//! 2. Find the first compiled route matching method and path
//! 3. Record `matchedRoute` / `matchedServiceKey`, build the [`Request`]
//! 4. Run the bound handler and write its reply to the context
//! 5. Continue the host chain
//!
//! Unmatched requests go straight to `next`.

use crate::error::Result;
use crate::handler::{BoxFuture, HandlerFuture};
use crate::host::{Context, Middleware, Next};
use crate::request::{Request, StringMap};
use crate::response::Reply;
use crate::router::RouteTable;
use crate::service::Service;
use crate::state::RequestState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// State key holding the matched route's full path
pub const MATCHED_ROUTE: &str = "matchedRoute";

/// State key holding the matched service's structural key
pub const MATCHED_SERVICE_KEY: &str = "matchedServiceKey";

/// State key under which registered services are listed
pub const SERVICES: &str = "services";

/// A registered service, type erased
pub trait ServiceEntry: Send + Sync {
    /// Service type name
    fn name(&self) -> &'static str;

    /// Start endpoint `handler` on `req`, `None` if there is no such endpoint
    fn invoke(&self, handler: &str, req: Request) -> Option<HandlerFuture>;
}

struct Registered<S> {
    service: Arc<S>,
    table: Arc<RouteTable<S>>,
}

impl<S: Service> ServiceEntry for Registered<S> {
    fn name(&self) -> &'static str {
        S::name()
    }

    fn invoke(&self, handler: &str, req: Request) -> Option<HandlerFuture> {
        self.table
            .endpoint(handler)
            .map(|endpoint| endpoint(Arc::clone(&self.service), req))
    }
}

/// Services registered on one request, by structural key
#[derive(Clone, Default)]
pub struct ServiceDirectory {
    services: BTreeMap<String, Arc<dyn ServiceEntry>>,
}

impl ServiceDirectory {
    /// Register `entry` under `key`, replacing any previous one
    pub fn register(&mut self, key: impl Into<String>, entry: Arc<dyn ServiceEntry>) {
        self.services.insert(key.into(), entry);
    }

    /// Service registered under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn ServiceEntry>> {
        self.services.get(key).cloned()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Look `key` up in the directory stored in `state`
    #[must_use]
    pub fn lookup(state: &RequestState, key: &str) -> Option<Arc<dyn ServiceEntry>> {
        state.update(|directory: &mut Self| directory.get(key))
    }
}

impl std::fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.services.iter().map(|(key, entry)| (key, entry.name())))
            .finish()
    }
}

/// Middleware serving one attached service
///
/// Built by [`crate::attach`]. Clones share the service instance and its
/// compiled table.
pub struct ServiceMiddleware<S> {
    path: String,
    key: String,
    debug: bool,
    service: Arc<S>,
    table: Arc<RouteTable<S>>,
}

impl<S: Service> ServiceMiddleware<S> {
    pub(crate) fn new(path: &str, key: String, debug: bool, service: Arc<S>, table: Arc<RouteTable<S>>) -> Self {
        Self {
            path: path.to_string(),
            key,
            debug,
            service,
            table,
        }
    }

    /// Path the service was attached under
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Structural key of the service
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The service instance
    #[must_use]
    pub const fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// The compiled route table
    #[must_use]
    pub const fn table(&self) -> &Arc<RouteTable<S>> {
        &self.table
    }

    fn register(&self, state: &RequestState) {
        let entry: Arc<dyn ServiceEntry> = Arc::new(Registered {
            service: Arc::clone(&self.service),
            table: Arc::clone(&self.table),
        });
        state.update(|directory: &mut ServiceDirectory| directory.register(self.key.clone(), entry));
        state.set_nested(&format!("{SERVICES}.{}", self.key), S::name());
    }
}

impl<S> Clone for ServiceMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            key: self.key.clone(),
            debug: self.debug,
            service: Arc::clone(&self.service),
            table: Arc::clone(&self.table),
        }
    }
}

impl<S> std::fmt::Debug for ServiceMiddleware<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMiddleware")
            .field("path", &self.path)
            .field("key", &self.key)
            .field("routes", &self.table.routes())
            .finish_non_exhaustive()
    }
}

impl<S: Service> Middleware for ServiceMiddleware<S> {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.register(ctx.state());

            let Some(route) = self.table.find(ctx.method(), ctx.path()) else {
                if self.debug {
                    debug!(service = S::name(), method = %ctx.method(), path = %ctx.path(), "No route matched");
                }
                return next.run(ctx).await;
            };
            let Some(bound) = self.table.resolve(route, &self.service) else {
                return next.run(ctx).await;
            };
            if self.debug {
                debug!(service = S::name(), route = ?route, path = %ctx.path(), "Route matched");
            }

            ctx.state().set(MATCHED_ROUTE, route.path.clone());
            ctx.state().set(MATCHED_SERVICE_KEY, self.key.clone());

            let params: StringMap = route
                .pattern
                .captures(ctx.path())
                .unwrap_or_default()
                .into_iter()
                .collect();
            let req = Request::builder(ctx.method(), ctx.path())
                .headers(ctx.headers().clone())
                .query_map(ctx.query().clone())
                .params(params)
                .body(ctx.body().clone())
                .state(ctx.state().clone())
                .build();

            let reply = bound(req).await?;
            write_reply(ctx, reply);
            next.run(ctx).await
        })
    }

    fn name(&self) -> &'static str {
        "ServiceMiddleware"
    }
}

fn write_reply(ctx: &mut Context, reply: Reply) {
    match reply {
        Reply::Response(res) => {
            ctx.set_status(res.status);
            if let Some(body) = res.body {
                ctx.set_body(body);
            }
        }
        Reply::Redirect(redirect) => ctx.redirect(redirect.status.code(), redirect.url),
    }
}
