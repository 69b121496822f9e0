//! Documented services.

use super::route::ClayRoute;
use super::RouteDocs;
use crate::router::CompiledRoute;
use crate::validation::ValidationSchema;
use serde::Serialize;

/// Documentation of one registered service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClayService {
    /// Service type name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Documented routes
    pub routes: Vec<ClayRoute>,
    /// Structural key the service was registered under
    #[serde(skip)]
    pub key: String,
    /// Registered but left out of the published tree
    #[serde(skip)]
    pub hidden: bool,
}

impl ClayService {
    /// Document a service's compiled routes
    ///
    /// Routes whose own docs are hidden are left out.
    #[must_use]
    pub fn new<S>(name: &str, key: &str, routes: &[CompiledRoute<S>]) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            routes: routes
                .iter()
                .filter(|route| !route.docs.as_ref().is_some_and(|docs| docs.hidden))
                .map(ClayRoute::from_compiled)
                .collect(),
            key: key.to_string(),
            hidden: false,
        }
    }

    /// First route served by endpoint `handler`
    #[must_use]
    pub fn route(&self, handler: &str) -> Option<&ClayRoute> {
        self.routes.iter().find(|route| route.is_handled_by(handler))
    }

    /// Mutable first route served by endpoint `handler`
    pub fn route_mut(&mut self, handler: &str) -> Option<&mut ClayRoute> {
        self.routes.iter_mut().find(|route| route.is_handled_by(handler))
    }

    /// Document the params `handler`'s validation reads
    pub fn process_validation_schema(&mut self, handler: &str, schema: &ValidationSchema) {
        if let Some(route) = self.route_mut(handler) {
            route.apply_validation_schema(schema);
        }
    }

    /// Apply route docs to `handler`'s route; hidden docs drop its routes
    pub fn process_route_docs(&mut self, handler: &str, docs: &RouteDocs) {
        if self.route(handler).is_none() {
            return;
        }
        if docs.hidden {
            self.routes.retain(|route| !route.is_handled_by(handler));
            return;
        }
        if let Some(route) = self.route_mut(handler) {
            route.apply_route_docs(docs);
        }
    }
}
