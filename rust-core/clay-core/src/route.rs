//! # Route Declarations
//!
//! What a service declares about its routes before compilation.
//!
//! ## Design Principles
//!
//! - **S**: `Route` only holds declaration data; compilation lives in `router`
//! - **O**: Optional fields fall back to per-method conventions at compile time
//! - **D**: Handlers are referenced by name or by factory, never by pointer

use crate::docs::RouteDocs;
use crate::error::Result;
use crate::handler::{BoundHandler, HandlerFuture};
use crate::request::Request;
use crate::response::Reply;
use serde::Serialize;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP methods understood by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// HTTP GET
    #[default]
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Conventional handler name (`get`, `post`, ...)
    #[must_use]
    pub fn handler_name(self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Conventional path when a declaration leaves it out
    ///
    /// Collection routes (`GET`, `POST`) sit on the service root, the rest
    /// address a single resource.
    #[must_use]
    pub const fn default_path(self) -> &'static str {
        match self {
            Self::Get | Self::Post => "",
            _ => "/:id",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported method name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub String);

impl std::fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported HTTP method: {}", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<&hyper::Method> for Method {
    type Error = UnsupportedMethod;

    fn try_from(method: &hyper::Method) -> std::result::Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Builds a handler bound to one service instance
pub type HandlerFactory<S> = Arc<dyn Fn(Arc<S>) -> BoundHandler + Send + Sync>;

/// How a route names its handler
pub enum RouteHandler<S> {
    /// An endpoint of the service, by name
    Named(String),
    /// A handler built from the owning service instance
    Factory(HandlerFactory<S>),
}

impl<S> RouteHandler<S> {
    /// Endpoint name, if this is a named handler
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Factory(_) => None,
        }
    }
}

impl<S> Clone for RouteHandler<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Named(name) => Self::Named(name.clone()),
            Self::Factory(factory) => Self::Factory(Arc::clone(factory)),
        }
    }
}

impl<S> std::fmt::Debug for RouteHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}()"),
            Self::Factory(_) => f.write_str("[Function]"),
        }
    }
}

/// A declared route
///
/// # Example
///
/// ```ignore
/// Route::get().path("/:id/personnel/:personnelId").handler("get_personnel")
/// ```
pub struct Route<S> {
    /// HTTP method
    pub method: Method,
    /// Path relative to the service; defaults per method when absent
    pub path: Option<String>,
    /// Handler; defaults to the lower-case method name when absent
    pub handler: Option<RouteHandler<S>>,
    /// Route-level documentation
    pub docs: Option<RouteDocs>,
}

impl<S> Route<S> {
    /// A route for `method` with every other field defaulted
    #[must_use]
    pub const fn new(method: Method) -> Self {
        Self {
            method,
            path: None,
            handler: None,
            docs: None,
        }
    }

    /// `GET` route
    #[must_use]
    pub const fn get() -> Self {
        Self::new(Method::Get)
    }

    /// `POST` route
    #[must_use]
    pub const fn post() -> Self {
        Self::new(Method::Post)
    }

    /// `PUT` route
    #[must_use]
    pub const fn put() -> Self {
        Self::new(Method::Put)
    }

    /// `PATCH` route
    #[must_use]
    pub const fn patch() -> Self {
        Self::new(Method::Patch)
    }

    /// `DELETE` route
    #[must_use]
    pub const fn delete() -> Self {
        Self::new(Method::Delete)
    }

    /// Set the path
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Point at a named endpoint
    #[must_use]
    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(RouteHandler::Named(name.into()));
        self
    }

    /// Use a handler built from the owning service
    #[must_use]
    pub fn factory<F, H, Fut>(mut self, factory: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>) -> H + Send + Sync + 'static,
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        let factory: HandlerFactory<S> = Arc::new(move |service: Arc<S>| {
            let handler = factory(service);
            let bound: BoundHandler =
                Arc::new(move |req: Request| -> HandlerFuture { Box::pin(handler(req)) });
            bound
        });
        self.handler = Some(RouteHandler::Factory(factory));
        self
    }

    /// Attach route-level documentation
    #[must_use]
    pub fn docs(mut self, docs: RouteDocs) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Path with the method default applied
    #[must_use]
    pub fn resolved_path(&self) -> &str {
        self.path.as_deref().unwrap_or_else(|| self.method.default_path())
    }

    /// Handler with the method default applied
    #[must_use]
    pub fn resolved_handler(&self) -> RouteHandler<S> {
        self.handler
            .clone()
            .unwrap_or_else(|| RouteHandler::Named(self.method.handler_name()))
    }
}

impl<S> Clone for Route<S> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            path: self.path.clone(),
            handler: self.handler.clone(),
            docs: self.docs.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Route<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} => {:?}", self.method, self.resolved_path(), self.resolved_handler())
    }
}
