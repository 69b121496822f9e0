//! # Route Table Compiler
//!
//! Reconciles the implicit CRUD conventions with a service's declared routes
//! and pre-compiles every path into a `matchit`-backed [`PathPattern`].
//!
//! ## Features
//!
//! - Implicit routes (`GET /:id -> get`, `POST -> post`, ..., `GET -> index`)
//! - Declared routes override implicit ones on `(method, handler)`
//! - First-match lookup in table order
//! - Compiled once per service instance ([`RouteCache`])
//!
//! ## SOLID Principles
//!
//! - **S**: Only builds and queries the table; handler composition is in `service`
//! - **O**: New conventions are new entries in `implicit_routes`
//! - **D**: Depends on `PathPattern`, not on `matchit` directly

use crate::docs::RouteDocs;
use crate::error::Result;
use crate::handler::{bind, BoundHandler, Handler};
use crate::pattern::PathPattern;
use crate::route::{Method, Route, RouteHandler};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A route ready for matching
pub struct CompiledRoute<S> {
    /// HTTP method
    pub method: Method,
    /// Full path (`prefix + service path + route path`)
    pub path: String,
    /// Compiled matcher for `path`
    pub pattern: PathPattern,
    /// Handler reference
    pub handler: RouteHandler<S>,
    /// Route-level documentation
    pub docs: Option<RouteDocs>,
}

impl<S> CompiledRoute<S> {
    /// Whether this route answers `method` on `path`
    #[must_use]
    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.method == method && self.pattern.matches(path)
    }
}

impl<S> std::fmt::Debug for CompiledRoute<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} => {:?}", self.method, self.path, self.handler)
    }
}

/// The CRUD routes every service gets unless it overrides them
///
/// Order matters: it is the order they are tried in.
#[must_use]
pub fn implicit_routes<S>() -> Vec<Route<S>> {
    vec![
        Route::get().path("/:id").handler("get"),
        Route::post().path("").handler("post"),
        Route::put().path("/:id").handler("put"),
        Route::patch().path("/:id").handler("patch"),
        Route::delete().path("/:id").handler("delete"),
        Route::get().path("").handler("index"),
    ]
}

/// Compile a route table
///
/// `base` is `prefix + service path`. Routes naming an endpoint for which
/// `has_handler` is false are left out.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a full path cannot be compiled.
pub fn compile<S>(
    declared: &[Route<S>],
    base: &str,
    has_handler: impl Fn(&str) -> bool,
) -> Result<Vec<CompiledRoute<S>>> {
    let overridden: Vec<(Method, String)> = declared
        .iter()
        .filter_map(|route| {
            route
                .resolved_handler()
                .name()
                .map(|name| (route.method, name.to_string()))
        })
        .collect();

    let implicit = implicit_routes::<S>().into_iter().filter(|route| {
        let name = route.resolved_handler().name().map(str::to_string);
        !overridden
            .iter()
            .any(|(method, handler)| *method == route.method && Some(handler) == name.as_ref())
    });

    let mut compiled = Vec::new();
    for route in implicit.chain(declared.iter().cloned()) {
        let handler = route.resolved_handler();
        if let Some(name) = handler.name() {
            if !has_handler(name) {
                continue;
            }
        }

        let path = full_path(base, route.resolved_path());
        let pattern = PathPattern::compile(&path)?;
        compiled.push(CompiledRoute {
            method: route.method,
            path,
            pattern,
            handler,
            docs: route.docs,
        });
    }
    Ok(compiled)
}

fn full_path(base: &str, route_path: &str) -> String {
    let path = format!("{base}{route_path}");
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

/// A service's compiled routes plus its composed endpoints
pub struct RouteTable<S> {
    routes: Vec<CompiledRoute<S>>,
    endpoints: HashMap<String, Handler<S>>,
}

impl<S> RouteTable<S> {
    /// Build a table from compiled routes and composed endpoints
    #[must_use]
    pub fn new(routes: Vec<CompiledRoute<S>>, endpoints: HashMap<String, Handler<S>>) -> Self {
        Self { routes, endpoints }
    }

    /// Compiled routes, in match order
    #[must_use]
    pub fn routes(&self) -> &[CompiledRoute<S>] {
        &self.routes
    }
}

impl<S> RouteTable<S>
where
    S: Send + Sync + 'static,
{

    /// First route matching `method` and `path`
    #[must_use]
    pub fn find(&self, method: Method, path: &str) -> Option<&CompiledRoute<S>> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    /// Composed endpoint by name
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&Handler<S>> {
        self.endpoints.get(name)
    }

    /// Bind a route's handler to `service`
    ///
    /// `None` if the route names an endpoint the service does not have.
    #[must_use]
    pub fn resolve(&self, route: &CompiledRoute<S>, service: &Arc<S>) -> Option<BoundHandler> {
        match &route.handler {
            RouteHandler::Named(name) => self
                .endpoint(name)
                .map(|handler| bind(Arc::clone(handler), Arc::clone(service))),
            RouteHandler::Factory(factory) => Some(factory(Arc::clone(service))),
        }
    }
}

/// Per-instance cache of a compiled [`RouteTable`]
///
/// Embedded in the service value. The mutex is held during compilation so
/// concurrent first callers compile once.
pub struct RouteCache<S> {
    table: Mutex<Option<Arc<RouteTable<S>>>>,
}

impl<S> RouteCache<S> {
    /// An empty cache
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(None),
        }
    }

    /// The cached table, if compiled
    #[must_use]
    pub fn get(&self) -> Option<Arc<RouteTable<S>>> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The cached table, compiling it with `init` on first use
    ///
    /// The flag is `true` when this call did the compiling.
    ///
    /// # Errors
    ///
    /// Propagates `init`'s error; the cache stays empty in that case.
    pub fn get_or_try_init(
        &self,
        init: impl FnOnce() -> Result<RouteTable<S>>,
    ) -> Result<(Arc<RouteTable<S>>, bool)> {
        let mut slot = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = slot.as_ref() {
            return Ok((Arc::clone(table), false));
        }
        let table = Arc::new(init()?);
        *slot = Some(Arc::clone(&table));
        Ok((table, true))
    }
}

impl<S> Default for RouteCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for RouteCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let compiled = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|table| table.routes.len());
        f.debug_struct("RouteCache").field("routes", &compiled).finish()
    }
}
