//! # Services
//!
//! How a service type declares its endpoints, hooks and routes, and how an
//! instance is attached under a path.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Declaration and attachment only; matching is the dispatcher's job
//! - **O**: Hooks are `Decorator`s; `EndpointBuilder::decorate` takes any of them
//! - **D**: Endpoints are plain async functions over `Arc<Self>` and a `Request`
//!
//! ## Example
//!
//! ```rust,ignore
//! struct Users { routes: RouteCache<Self> }
//!
//! impl Service for Users {
//!     fn define(def: &mut Definition<Self>) {
//!         def.endpoint("index", |_users, _req| async { Ok(Response::ok(json!([])).into()) });
//!         def.endpoint("post", create_user)
//!             .validate(ValidationSchema::new().body(Validatable::keys(["name"])));
//!     }
//!
//!     fn route_cache(&self) -> &RouteCache<Self> {
//!         &self.routes
//!     }
//! }
//!
//! let users = attach("/users", Arc::new(Users::default()), ServiceOptions::default(), &documenter)?;
//! ```

use crate::dispatcher::ServiceMiddleware;
use crate::docs::{Documenter, PendingDoc, RouteDocs, ServiceDocs};
use crate::error::Result;
use crate::handler::{handler, Handler};
use crate::hooks::{compose, After, Before, Decorator, ForwardTo, HasPermission, Resource, Validate};
use crate::policy::Policy;
use crate::request::Request;
use crate::response::Reply;
use crate::route::{Route, RouteHandler};
use crate::router::{self, RouteCache, RouteTable};
use crate::validation::ValidationSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Last path segment of a type's name, without generics
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A type whose instances serve routes
pub trait Service: Send + Sync + Sized + 'static {
    /// Declare endpoints, hooks and routes
    ///
    /// Runs once per attached instance (and once more per type when the
    /// documentation facts are first collected).
    fn define(def: &mut Definition<Self>);

    /// The instance's route cache
    fn route_cache(&self) -> &RouteCache<Self>;

    /// Name used in documentation and errors
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

struct Endpoint<S> {
    name: String,
    method: Handler<S>,
    decorators: Vec<Box<dyn Decorator<S>>>,
}

/// Everything a service type declares
pub struct Definition<S> {
    class: &'static str,
    endpoints: Vec<Endpoint<S>>,
    routes: Vec<Route<S>>,
    facts: Vec<PendingDoc>,
}

impl<S: Service> Definition<S> {
    /// Run `S::define` on a fresh definition
    #[must_use]
    pub fn build() -> Self {
        let mut definition = Self {
            class: S::name(),
            endpoints: Vec::new(),
            routes: Vec::new(),
            facts: Vec::new(),
        };
        S::define(&mut definition);
        definition
    }

    /// Declare endpoint `name`
    ///
    /// Declaring a name twice replaces the earlier endpoint along with its
    /// hooks and documentation facts.
    pub fn endpoint<F, Fut>(&mut self, name: &str, method: F) -> EndpointBuilder<'_, S>
    where
        F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.endpoints.retain(|endpoint| endpoint.name != name);
        self.facts.retain(|fact| fact.method() != name);
        self.endpoints.push(Endpoint {
            name: name.to_string(),
            method: handler(method),
            decorators: Vec::new(),
        });
        let index = self.endpoints.len() - 1;
        EndpointBuilder { definition: self, index }
    }

    /// Append a declared route
    pub fn route(&mut self, route: Route<S>) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Replace all declared routes
    pub fn routes(&mut self, routes: impl IntoIterator<Item = Route<S>>) -> &mut Self {
        self.routes = routes.into_iter().collect();
        self
    }

    /// Declared routes, in declaration order
    #[must_use]
    pub fn declared_routes(&self) -> &[Route<S>] {
        &self.routes
    }

    /// Documentation facts recorded by hooks
    #[must_use]
    pub fn doc_facts(&self) -> &[PendingDoc] {
        &self.facts
    }

    /// Whether endpoint `name` is declared
    #[must_use]
    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints.iter().any(|endpoint| endpoint.name == name)
    }

    /// Wrap every endpoint in its hooks
    ///
    /// # Errors
    ///
    /// The first hook that fails to wrap (e.g. an unknown policy check).
    pub fn compose(&self) -> Result<HashMap<String, Handler<S>>> {
        self.endpoints
            .iter()
            .map(|endpoint| {
                let composed = compose(Arc::clone(&endpoint.method), &endpoint.decorators)?;
                Ok((endpoint.name.clone(), composed))
            })
            .collect()
    }
}

/// Adds hooks and routes to one endpoint
///
/// Hooks are listed outermost first: the first one added runs first on the
/// way in and last on the way out.
pub struct EndpointBuilder<'a, S> {
    definition: &'a mut Definition<S>,
    index: usize,
}

#[allow(clippy::return_self_not_must_use)]
impl<S: Service> EndpointBuilder<'_, S> {
    fn name(&self) -> String {
        self.definition.endpoints[self.index].name.clone()
    }

    fn fact(&mut self, fact: PendingDoc) {
        self.definition.facts.push(fact);
    }

    /// Add any hook
    pub fn decorate(self, decorator: impl Decorator<S> + 'static) -> Self {
        self.definition.endpoints[self.index]
            .decorators
            .push(Box::new(decorator));
        self
    }

    /// Serve this endpoint on `route`
    ///
    /// A route without a handler is bound to this endpoint.
    pub fn route(self, mut route: Route<S>) -> Self {
        if route.handler.is_none() {
            route.handler = Some(RouteHandler::Named(self.name()));
        }
        self.definition.routes.push(route);
        self
    }

    /// Run `hook` before the endpoint
    pub fn before<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Request, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.decorate(Before::new(hook))
    }

    /// Run `hook` on the endpoint's reply
    pub fn after<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Request, Arc<Reply>, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Reply>>> + Send + 'static,
    {
        self.decorate(After::new(hook))
    }

    /// Validate requests against `schema`
    pub fn validate(mut self, schema: ValidationSchema) -> Self {
        let hook = Validate::new(schema);
        let fact = PendingDoc::Validation {
            class: self.definition.class.to_string(),
            method: self.name(),
            schema: Arc::clone(hook.schema()),
        };
        self.fact(fact);
        self.decorate(hook)
    }

    /// Require check `check` of policy `P`
    pub fn has_permission<P: Policy>(self, check: &str) -> Self {
        self.decorate(HasPermission::<P>::new(check))
    }

    /// Record endpoint `handler` of the service under `service_key` as the
    /// forward target
    pub fn forward_to(mut self, service_key: &str, handler: &str) -> Self {
        let fact = PendingDoc::Forward {
            class: self.definition.class.to_string(),
            method: self.name(),
            target_key: service_key.to_string(),
            target_method: handler.to_string(),
        };
        self.fact(fact);
        self.decorate(ForwardTo::new(service_key, handler))
    }

    /// Send `body[key]` through the view type `R`
    pub fn resource<R>(self, key: &str) -> Self
    where
        R: Serialize + DeserializeOwned + 'static,
    {
        self.decorate(Resource::<R>::new(key))
    }

    /// Document the endpoint's route
    pub fn docs(mut self, docs: RouteDocs) -> Self {
        let fact = PendingDoc::RouteDocs {
            class: self.definition.class.to_string(),
            method: self.name(),
            docs,
        };
        self.fact(fact);
        self
    }
}

/// Options for [`attach`]
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Prepended to the service path in every route
    pub prefix: String,
    /// Log compiled routes and per-request matching
    pub debug: bool,
    /// Service-level documentation
    pub docs: ServiceDocs,
}

impl ServiceOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path prefix
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable debug logging
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the service documentation
    #[must_use]
    pub fn docs(mut self, docs: ServiceDocs) -> Self {
        self.docs = docs;
        self
    }
}

/// Structural key of a service path
///
/// The leading slash is dropped, `:param` segments are skipped and the rest
/// are joined with dots: `/api/games/:gameId/stats` becomes `api.games.stats`.
#[must_use]
pub fn service_key(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && !segment.starts_with(':'))
        .collect::<Vec<_>>()
        .join(".")
}

/// Attach `service` under `path`
///
/// The route table is compiled on the instance's first attach and reused on
/// later ones. The first attach also registers the service's documentation.
///
/// # Errors
///
/// - `Error::UnknownPolicyCheck` if a permission hook names a missing check
/// - `Error::InvalidRoutePattern` if a route path cannot be compiled
pub fn attach<S: Service>(
    path: &str,
    service: Arc<S>,
    options: ServiceOptions,
    documenter: &Documenter,
) -> Result<ServiceMiddleware<S>> {
    let base = format!("{}{path}", options.prefix);
    let (table, fresh) = service.route_cache().get_or_try_init(|| {
        let definition = Definition::<S>::build();
        documenter.declare_facts(S::name(), definition.doc_facts());
        let endpoints = definition.compose()?;
        let routes = router::compile(definition.declared_routes(), &base, |name| endpoints.contains_key(name))?;
        Ok(RouteTable::new(routes, endpoints))
    })?;

    let key = service_key(path);
    if fresh {
        if options.debug {
            for route in table.routes() {
                info!(service = S::name(), route = ?route, "Compiled route");
            }
        }
        documenter.document_service(S::name(), &key, &options.docs, table.routes());
    }

    Ok(ServiceMiddleware::new(path, key, options.debug, service, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::policy::PolicyChecks;
    use crate::request::HostContext;
    use crate::response::Response;
    use crate::route::Method;

    #[derive(Default)]
    struct Tracks {
        routes: RouteCache<Self>,
    }

    impl Service for Tracks {
        fn define(def: &mut Definition<Self>) {
            def.endpoint("index", |_tracks, _req| async { Ok(Reply::from(Response::new(200))) });
            def.endpoint("titles", |_tracks, _req| async { Ok(Reply::from(Response::new(200))) })
                .route(Route::get().path("/titles"))
                .docs(RouteDocs::new().description("Track titles"));
            def.endpoint("post", |_tracks, _req| async { Ok(Reply::from(Response::new(201))) })
                .validate(ValidationSchema::new());
        }

        fn route_cache(&self) -> &RouteCache<Self> {
            &self.routes
        }
    }

    #[derive(Default)]
    struct Locked {
        routes: RouteCache<Self>,
    }

    impl Service for Locked {
        fn define(def: &mut Definition<Self>) {
            def.endpoint("index", |_locked, _req| async { Ok(Reply::from(Response::new(200))) })
                .has_permission::<OpenPolicy>("nope");
        }

        fn route_cache(&self) -> &RouteCache<Self> {
            &self.routes
        }
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Tracks>(), "Tracks");
        assert_eq!(Tracks::name(), "Tracks");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_service_key() {
        assert_eq!(service_key("/users"), "users");
        assert_eq!(service_key("/api/users"), "api.users");
        assert_eq!(service_key("/api/games/:gameId/stats"), "api.games.stats");
        assert_eq!(service_key("/"), "");
    }

    #[test]
    fn test_definition_records_facts() {
        let def = Definition::<Tracks>::build();
        assert!(def.has_endpoint("titles"));
        assert_eq!(def.declared_routes().len(), 1);
        assert_eq!(def.doc_facts().len(), 2);
        assert_eq!(def.compose().unwrap().len(), 3);
    }

    #[test]
    fn test_attach_compiles_once() {
        let docs = Documenter::new();
        let tracks = Arc::new(Tracks::default());

        let first = attach("/tracks", Arc::clone(&tracks), ServiceOptions::new(), &docs).unwrap();
        let second = attach("/other", Arc::clone(&tracks), ServiceOptions::new(), &docs).unwrap();

        assert!(Arc::ptr_eq(first.table(), second.table()));
        assert_eq!(second.key(), "other");
        let paths: Vec<_> = second
            .table()
            .routes()
            .iter()
            .map(|r| (r.method, r.path.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                (Method::Post, "/tracks"),
                (Method::Get, "/tracks"),
                (Method::Get, "/tracks/titles"),
            ]
        );
        assert_eq!(docs.snapshot().services.len(), 1);
        assert_eq!(docs.pending_len(), 0);
    }

    #[test]
    fn test_attach_with_prefix() {
        let docs = Documenter::new();
        let options = ServiceOptions::new().prefix("/v1").docs(ServiceDocs::default().hidden());
        let mw = attach("/tracks", Arc::new(Tracks::default()), options, &docs).unwrap();
        assert_eq!(mw.key(), "tracks");
        assert!(mw.table().routes().iter().all(|r| r.path.starts_with("/v1/tracks")));
        assert!(docs.snapshot().services.is_empty());
        assert!(docs.service("Tracks").is_some());
    }

    #[test]
    fn test_unknown_policy_check_fails_attach() {
        let docs = Documenter::new();
        let result = attach("/locked", Arc::new(Locked::default()), ServiceOptions::new(), &docs);
        assert!(matches!(result, Err(Error::UnknownPolicyCheck { .. })));
    }

    struct OpenPolicy;

    impl Policy for OpenPolicy {
        fn from_context(_ctx: &HostContext) -> Self {
            Self
        }

        fn checks(checks: &mut PolicyChecks<Self>) {
            checks.check("open", |_policy, _req| async { true });
        }
    }
}
