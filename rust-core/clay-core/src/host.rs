//! # Host Middleware Chain
//!
//! The minimal middleware host services are attached to: a mutable
//! per-request [`Context`], the [`Middleware`] trait, and an ordered onion
//! [`MiddlewareChain`].
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Each middleware has a single responsibility
//! - **O**: Extensible via the `Middleware` trait
//! - **D**: The server depends on the chain, not on concrete middlewares
//!
//! A middleware runs its own code, calls `next.run(ctx)` to hand over to the
//! rest of the chain, and may inspect the response once that returns.

use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::request::{HostContext, StringMap};
use crate::route::Method;
use crate::state::RequestState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info};

/// Mutable per-request host context
///
/// Holds the incoming request line, headers, query and parsed body, the
/// shared [`RequestState`], and the response being built.
#[derive(Debug)]
pub struct Context {
    method: Method,
    path: String,
    headers: StringMap,
    query: StringMap,
    body: Value,
    state: RequestState,
    status: Option<u16>,
    response_body: Option<Value>,
    response_headers: StringMap,
}

impl Context {
    /// Build a context from a method and a target (`/path?query`)
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            headers: StringMap::new(),
            query: parse_query_string(query),
            body: Value::Null,
            state: RequestState::new(),
            status: None,
            response_body: None,
            response_headers: StringMap::new(),
        }
    }

    /// Add a request header (name is lower-cased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the parsed request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request path (no query string)
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers
    #[must_use]
    pub const fn headers(&self) -> &StringMap {
        &self.headers
    }

    /// Request header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Set a request header (name is lower-cased)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Parsed, decoded query parameters
    #[must_use]
    pub const fn query(&self) -> &StringMap {
        &self.query
    }

    /// Parsed request body
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Shared per-request state
    #[must_use]
    pub const fn state(&self) -> &RequestState {
        &self.state
    }

    /// Handle exposing request line, headers and state
    #[must_use]
    pub fn host_context(&self) -> HostContext {
        HostContext::new(self.method, self.path.clone(), self.headers.clone(), self.state.clone())
    }

    /// Set the response status
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Set the response body
    pub fn set_body(&mut self, body: impl Into<Value>) {
        self.response_body = Some(body.into());
    }

    /// Set a response header (name is lower-cased)
    pub fn set_response_header(&mut self, name: &str, value: impl Into<String>) {
        self.response_headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Redirect: set the status and the `Location` header
    pub fn redirect(&mut self, status: u16, url: impl Into<String>) {
        self.set_status(status);
        self.set_response_header("location", url);
    }

    /// Response status, `404` if nothing answered
    #[must_use]
    pub fn response_status(&self) -> u16 {
        self.status.unwrap_or(404)
    }

    /// Response body, if any
    #[must_use]
    pub const fn response_body(&self) -> Option<&Value> {
        self.response_body.as_ref()
    }

    /// Response header by name (case-insensitive)
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All response headers
    #[must_use]
    pub const fn response_headers(&self) -> &StringMap {
        &self.response_headers
    }
}

/// Middleware trait for request/response interception
///
/// Middlewares run in insertion order on the way in and unwind in reverse.
pub trait Middleware: Send + Sync {
    /// Handle the request, calling `next.run(ctx)` to continue the chain
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>>;

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// The remainder of the chain after the current middleware
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// A chain continuation that does nothing
    #[must_use]
    pub const fn end() -> Self {
        Self { rest: &[] }
    }

    /// Run the rest of the chain
    pub fn run<'b>(self, ctx: &'b mut Context) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        match self.rest.split_first() {
            Some((first, rest)) => first.handle(ctx, Next { rest }),
            None => Box::pin(async { Ok(()) }),
        }
    }
}

/// Ordered middleware chain
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Add a middleware, builder style
    #[must_use]
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain, returning whatever error escapes it
    ///
    /// # Errors
    ///
    /// Any error a middleware or handler returns.
    pub async fn run(&self, ctx: &mut Context) -> Result<()> {
        Next {
            rest: &self.middlewares,
        }
        .run(ctx)
        .await
    }

    /// Run the chain and turn an escaped error into a response
    ///
    /// `Error::Http` keeps its status and payload; anything else is logged
    /// and answered with its status (usually 500).
    pub async fn handle(&self, ctx: &mut Context) {
        if let Err(err) = self.run(ctx).await {
            apply_error(ctx, &err);
        }
    }
}

fn apply_error(ctx: &mut Context, err: &Error) {
    match err {
        Error::Http { status, payload } => {
            ctx.set_status(*status);
            ctx.set_body(payload.clone());
        }
        other => {
            let status = other.status();
            error!(
                method = %ctx.method(),
                path = %ctx.path(),
                status,
                error = %other,
                "Request failed"
            );
            ctx.set_status(status);
            ctx.set_body(json!({ "error": other.to_string() }));
        }
    }
}

/// Logging middleware - logs requests in structured JSON format
///
/// Assigns an `x-request-id` when the client sent none and echoes it on the
/// response.
#[derive(Default)]
pub struct LoggingMiddleware {
    log_headers: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable header logging
    #[must_use]
    pub const fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let request_id = match ctx.header("x-request-id") {
                Some(id) => id.to_string(),
                None => {
                    let id = next_request_id();
                    ctx.set_header("x-request-id", id.clone());
                    id
                }
            };
            ctx.set_response_header("x-request-id", request_id.clone());

            if self.log_headers {
                info!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    request_id = %request_id,
                    headers = ?ctx.headers(),
                    "Request received"
                );
            } else {
                info!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    request_id = %request_id,
                    "Request received"
                );
            }

            let start = Instant::now();
            let result = next.run(ctx).await;

            info!(
                method = %ctx.method(),
                path = %ctx.path(),
                status = ctx.response_status(),
                request_id = %request_id,
                duration_ms = %start.elapsed().as_millis(),
                failed = result.is_err(),
                "Response sent"
            );
            result
        })
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

fn next_request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{nanos:x}-{seq:x}")
}

/// Parse and percent-decode a query string (`+` is a space)
#[must_use]
pub fn parse_query_string(query: Option<&str>) -> StringMap {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn url_decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), std::borrow::Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Teapot;

    impl Middleware for Teapot {
        fn handle<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                ctx.set_status(418);
                ctx.set_body("short and stout");
                Ok(())
            })
        }
    }

    struct Trail(&'static str);

    impl Middleware for Trail {
        fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                ctx.state().update(|trail: &mut Vec<String>| trail.push(format!("{}:in", self.0)));
                next.run(ctx).await?;
                ctx.state().update(|trail: &mut Vec<String>| trail.push(format!("{}:out", self.0)));
                Ok(())
            })
        }
    }

    struct Fails;

    impl Middleware for Fails {
        fn handle<'a>(&'a self, _ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(Error::http(405, json!({ "reason": "nope" }))) })
        }
    }

    #[test]
    fn test_middleware_chain_empty() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_context_parses_target() {
        let ctx = Context::new(Method::Get, "/search?term=new+york&page=2&flag")
            .with_header("X-Api-Key", "k");
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query().get("term").map(String::as_str), Some("new york"));
        assert_eq!(ctx.query().get("page").map(String::as_str), Some("2"));
        assert_eq!(ctx.query().get("flag").map(String::as_str), Some(""));
        assert_eq!(ctx.header("x-api-key"), Some("k"));
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let query = parse_query_string(Some("name=J%C3%BCrgen&a%26b=c"));
        assert_eq!(query.get("name").map(String::as_str), Some("Jürgen"));
        assert_eq!(query.get("a&b").map(String::as_str), Some("c"));
        assert!(parse_query_string(None).is_empty());
    }

    #[tokio::test]
    async fn test_unanswered_request_is_404() {
        let chain = MiddlewareChain::new().with(Trail("a"));
        let mut ctx = Context::new(Method::Get, "/nowhere");
        chain.handle(&mut ctx).await;
        assert_eq!(ctx.response_status(), 404);
        assert!(ctx.response_body().is_none());
    }

    #[tokio::test]
    async fn test_onion_order() {
        let chain = MiddlewareChain::new()
            .with(Trail("a"))
            .with(Trail("b"))
            .with(Teapot);
        let mut ctx = Context::new(Method::Get, "/");
        chain.handle(&mut ctx).await;

        assert_eq!(ctx.response_status(), 418);
        assert_eq!(
            ctx.state().get_typed::<Vec<String>>(),
            Some(vec![
                "a:in".to_string(),
                "b:in".to_string(),
                "b:out".to_string(),
                "a:out".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_http_error_becomes_response() {
        let chain = MiddlewareChain::new().with(Fails);
        let mut ctx = Context::new(Method::Put, "/secrets/1");
        chain.handle(&mut ctx).await;
        assert_eq!(ctx.response_status(), 405);
        assert_eq!(ctx.response_body(), Some(&json!({ "reason": "nope" })));
    }

    #[tokio::test]
    async fn test_other_errors_become_500() {
        struct Broken;
        impl Middleware for Broken {
            fn handle<'a>(&'a self, _ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<()>> {
                Box::pin(async { Err(Error::NoForwardTarget) })
            }
        }

        let chain = MiddlewareChain::new().with(Broken);
        let mut ctx = Context::new(Method::Get, "/");
        chain.handle(&mut ctx).await;
        assert_eq!(ctx.response_status(), 500);
    }

    #[tokio::test]
    async fn test_logging_assigns_request_id() {
        let chain = MiddlewareChain::new().with(LoggingMiddleware::new()).with(Teapot);
        let mut ctx = Context::new(Method::Get, "/");
        chain.handle(&mut ctx).await;

        let id = ctx.header("x-request-id").map(str::to_string);
        assert!(id.is_some());
        assert_eq!(ctx.response_header("x-request-id").map(str::to_string), id);
    }

    #[tokio::test]
    async fn test_logging_keeps_client_request_id() {
        let chain = MiddlewareChain::new().with(LoggingMiddleware::new().with_headers());
        let mut ctx = Context::new(Method::Get, "/").with_header("X-Request-Id", "client-1");
        chain.handle(&mut ctx).await;
        assert_eq!(ctx.response_header("x-request-id"), Some("client-1"));
    }
}
