//! # Documentation Aggregator
//!
//! Assembles a queryable tree of services, routes and params from three
//! sources: the compiled route tables, route-level docs, and facts recorded
//! by hooks (validation schemas, forwarding).
//!
//! ## Lifecycle
//!
//! Hook facts are known as soon as a service type is *declared*, which is
//! before any instance is attached under a path. They wait in a pending
//! queue keyed by type name and endpoint name. When a service registers,
//! its pending validation and route-docs facts are applied and drained, and
//! any forwarding fact whose source and target services are both registered
//! is resolved and dropped.
//!
//! The [`Documenter`] is a cheap cloneable handle; every clone sees the same
//! tree.

mod param;
mod route;
mod service;

pub use param::{ClayParam, ParamLocation, RequiredState};
pub use route::ClayRoute;
pub use service::ClayService;

use crate::router::CompiledRoute;
use crate::service::{Definition, Service};
use crate::validation::ValidationSchema;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Parameter descriptions per location, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamDocs {
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Body fields
    pub body: Vec<(String, String)>,
    /// Headers
    pub headers: Vec<(String, String)>,
    /// Path parameters
    pub route: Vec<(String, String)>,
}

impl ParamDocs {
    /// Entries grouped by location, in documentation order
    #[must_use]
    pub fn by_location(&self) -> [(ParamLocation, &[(String, String)]); 4] {
        [
            (ParamLocation::Query, self.query.as_slice()),
            (ParamLocation::Body, self.body.as_slice()),
            (ParamLocation::Headers, self.headers.as_slice()),
            (ParamLocation::Route, self.route.as_slice()),
        ]
    }
}

/// Route-level documentation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDocs {
    /// Route description
    pub description: Option<String>,
    /// Parameter descriptions
    pub params: ParamDocs,
    /// Leave the route out of the tree
    pub hidden: bool,
    /// Example payloads
    pub samples: Vec<Value>,
}

impl RouteDocs {
    /// Empty docs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Describe a query parameter
    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.query.push((name.into(), description.into()));
        self
    }

    /// Describe a body field
    #[must_use]
    pub fn body_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.body.push((name.into(), description.into()));
        self
    }

    /// Describe a header
    #[must_use]
    pub fn header_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.headers.push((name.into(), description.into()));
        self
    }

    /// Describe a path parameter
    #[must_use]
    pub fn route_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.route.push((name.into(), description.into()));
        self
    }

    /// Hide the route
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Add an example payload
    #[must_use]
    pub fn sample(mut self, sample: impl Into<Value>) -> Self {
        self.samples.push(sample.into());
        self
    }
}

/// Service-level documentation options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDocs {
    /// Keep the service out of the published tree
    pub hidden: bool,
    /// Service description
    pub description: Option<String>,
}

impl ServiceDocs {
    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Hide the service
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A documentation fact waiting for its service
#[derive(Debug, Clone)]
pub enum PendingDoc {
    /// An endpoint validates requests with `schema`
    Validation {
        /// Declaring service type name
        class: String,
        /// Endpoint name
        method: String,
        /// The schema
        schema: Arc<ValidationSchema>,
    },
    /// An endpoint carries route docs
    RouteDocs {
        /// Declaring service type name
        class: String,
        /// Endpoint name
        method: String,
        /// The docs
        docs: RouteDocs,
    },
    /// An endpoint forwards to another service's endpoint
    Forward {
        /// Declaring service type name
        class: String,
        /// Endpoint name
        method: String,
        /// Structural key of the target service
        target_key: String,
        /// Target endpoint name
        target_method: String,
    },
}

impl PendingDoc {
    fn class(&self) -> &str {
        match self {
            Self::Validation { class, .. } | Self::RouteDocs { class, .. } | Self::Forward { class, .. } => class.as_str(),
        }
    }

    /// Endpoint name the fact belongs to
    pub(crate) fn method(&self) -> &str {
        match self {
            Self::Validation { method, .. } | Self::RouteDocs { method, .. } | Self::Forward { method, .. } => {
                method.as_str()
            }
        }
    }

    const fn is_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }
}

/// Published documentation tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClayDocs {
    /// Visible services, in registration order
    pub services: Vec<ClayService>,
}

#[derive(Debug, Default)]
struct DocTree {
    services: Vec<ClayService>,
    pending: Vec<PendingDoc>,
    declared: HashSet<String>,
}

impl DocTree {
    fn service_named(&self, name: &str) -> Option<usize> {
        self.services.iter().position(|s| s.name == name)
    }

    fn service_keyed(&self, key: &str) -> Option<usize> {
        self.services.iter().position(|s| s.key == key)
    }

    fn apply_queued(&mut self, index: usize) {
        let name = self.services[index].name.clone();
        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|fact| !fact.is_forward() && fact.class() == name);
        self.pending = rest;

        let service = &mut self.services[index];
        for fact in &mine {
            if let PendingDoc::Validation { method, schema, .. } = fact {
                service.process_validation_schema(method, schema);
            }
        }
        for fact in &mine {
            if let PendingDoc::RouteDocs { method, docs, .. } = fact {
                service.process_route_docs(method, docs);
            }
        }
    }

    fn resolve_forwards(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for fact in pending {
            let PendingDoc::Forward {
                class,
                method,
                target_key,
                target_method,
            } = &fact
            else {
                self.pending.push(fact);
                continue;
            };

            let (Some(source), Some(target)) = (self.service_named(class), self.service_keyed(target_key)) else {
                self.pending.push(fact);
                continue;
            };

            let copied = self.services[target]
                .route(target_method)
                .map(|route| (route.description.clone(), route.params.clone()));
            if let (Some((description, params)), Some(route)) = (copied, self.services[source].route_mut(method)) {
                if route.is_undocumented() {
                    route.description = description;
                    route.params = params;
                }
            }
            debug!(service = %class, endpoint = %method, target = %target_key, "Resolved forwarded docs");
        }
    }
}

/// Shared handle to the documentation tree
#[derive(Debug, Clone, Default)]
pub struct Documenter {
    tree: Arc<RwLock<DocTree>>,
}

impl Documenter {
    /// An empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, DocTree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocTree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the hook facts of service type `S`
    ///
    /// Runs once per type; later calls (including the implicit one in
    /// `attach`) do nothing.
    pub fn declare<S: Service>(&self) {
        if self.read().declared.contains(S::name()) {
            return;
        }
        let definition = Definition::<S>::build();
        self.declare_facts(S::name(), definition.doc_facts());
    }

    pub(crate) fn declare_facts(&self, class: &str, facts: &[PendingDoc]) {
        let mut tree = self.write();
        if tree.declared.insert(class.to_string()) {
            tree.pending.extend(facts.iter().cloned());
        }
    }

    /// Queue a validation fact
    pub fn document_validation_schema(&self, class: &str, method: &str, schema: Arc<ValidationSchema>) {
        self.write().pending.push(PendingDoc::Validation {
            class: class.to_string(),
            method: method.to_string(),
            schema,
        });
    }

    /// Queue a route-docs fact
    pub fn document_route(&self, class: &str, method: &str, docs: RouteDocs) {
        self.write().pending.push(PendingDoc::RouteDocs {
            class: class.to_string(),
            method: method.to_string(),
            docs,
        });
    }

    /// Queue a forwarding fact
    pub fn document_forwarded_request(&self, target_key: &str, target_method: &str, class: &str, method: &str) {
        let mut tree = self.write();
        tree.pending.push(PendingDoc::Forward {
            class: class.to_string(),
            method: method.to_string(),
            target_key: target_key.to_string(),
            target_method: target_method.to_string(),
        });
        tree.resolve_forwards();
    }

    /// Register a service and reconcile pending facts
    pub fn document_service<S>(&self, name: &str, key: &str, docs: &ServiceDocs, routes: &[CompiledRoute<S>]) {
        let mut service = ClayService::new(name, key, routes);
        service.description = docs.description.clone().unwrap_or_default();
        service.hidden = docs.hidden;

        let mut tree = self.write();
        tree.services.push(service);
        let index = tree.services.len() - 1;
        tree.apply_queued(index);
        tree.resolve_forwards();
        debug!(service = %name, key = %key, hidden = docs.hidden, "Documented service");
    }

    /// Copy of the published tree (hidden services left out)
    #[must_use]
    pub fn snapshot(&self) -> ClayDocs {
        ClayDocs {
            services: self
                .read()
                .services
                .iter()
                .filter(|service| !service.hidden)
                .cloned()
                .collect(),
        }
    }

    /// Published tree as JSON
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// A registered service by type name, hidden ones included
    #[must_use]
    pub fn service(&self, name: &str) -> Option<ClayService> {
        self.read().services.iter().find(|s| s.name == name).cloned()
    }

    /// Number of facts still waiting
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.read().pending.len()
    }
}
