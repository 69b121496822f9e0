//! # Clay Core
//!
//! Service routing, request validation, hooks and self-assembling API
//! documentation for middleware-style HTTP hosts.
//!
//! ## Architecture
//!
//! A service type declares its endpoints once ([`Service::define`]). Each
//! endpoint is an async function wrapped in hooks (validation, permission
//! checks, before/after, forwarding). [`attach`] compiles the service's routes
//! (implicit CRUD conventions merged with declared routes) and returns a
//! [`ServiceMiddleware`] to mount in a host [`MiddlewareChain`]. The same
//! declarations feed a [`Documenter`] that assembles a tree of services,
//! routes and params.
//!
//! ## Modules
//!
//! - `service` - Service declarations and `attach`
//! - `router` - Route table compiler and per-instance cache
//! - `route` - Route declarations and HTTP methods
//! - `pattern` - `:param` path patterns backed by matchit
//! - `dispatcher` - Middleware that matches and invokes endpoints
//! - `hooks` - Before, After, Validate, HasPermission, ForwardTo, Resource
//! - `validation` - Declarative validation engine
//! - `policy` - Permission policies
//! - `docs` - Documentation aggregator
//! - `forward` - Forwarding requests between services
//! - `request` / `response` - Immutable request view and replies
//! - `state` - Per-request shared state
//! - `host` - Minimal middleware host (context, chain, logging)
//! - `server` - HTTP server built on Hyper
//! - `json` - Body parsing with simd-json
//! - `telemetry` - Tracing subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatcher;
pub mod docs;
pub mod error;
pub mod forward;
pub mod handler;
pub mod hooks;
pub mod host;
pub mod json;
pub mod pattern;
pub mod policy;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;
pub mod validation;

pub use dispatcher::{ServiceDirectory, ServiceEntry, ServiceMiddleware};
pub use docs::{ClayDocs, Documenter, RouteDocs, ServiceDocs};
pub use error::{Error, Result};
pub use forward::{forward, ForwardTarget};
pub use handler::{BoxFuture, Handler, HandlerFuture};
pub use hooks::{After, Before, Decorator, ForwardTo, HasPermission, Resource, Validate};
pub use host::{Context, LoggingMiddleware, Middleware, MiddlewareChain, Next};
pub use policy::{Policy, PolicyChecks, PolicyDenial, PolicyResponse};
pub use request::{HostContext, Request, RequestOverrides};
pub use response::{redirect, Redirect, RedirectStatus, Reply, Response};
pub use route::{Method, Route};
pub use router::RouteCache;
pub use server::{Server, ServerConfig};
pub use service::{attach, service_key, Definition, EndpointBuilder, Service, ServiceOptions};
pub use state::RequestState;
pub use telemetry::init_tracing;
pub use validation::{
    validate, Condition, Entity, ErrorMap, Requirement, Requirements, Rule, Validatable, ValidationSchema,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
