//! Documented routes.

use super::param::{ClayParam, ParamLocation, RequiredState};
use super::RouteDocs;
use crate::route::Method;
use crate::router::CompiledRoute;
use crate::validation::{Location, SchemaEntry, Validatable, ValidationSchema};
use serde::Serialize;
use serde_json::Value;

/// Documentation of one compiled route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClayRoute {
    /// HTTP method
    pub method: Method,
    /// Full path
    pub path: String,
    /// Free-form description
    pub description: String,
    /// Parameters, in documentation order
    pub params: Vec<ClayParam>,
    /// Example payloads
    pub samples: Vec<Value>,
    /// Endpoint name, `None` for factory handlers
    #[serde(skip)]
    pub handler: Option<String>,
}

impl ClayRoute {
    /// Document a compiled route
    ///
    /// Path parameters (`:id`) are documented as required route params, then
    /// the route's own docs are applied.
    #[must_use]
    pub fn from_compiled<S>(route: &CompiledRoute<S>) -> Self {
        let params = route
            .path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .map(|name| ClayParam::new(ParamLocation::Route, name, RequiredState::Yes))
            .collect();

        let mut doc = Self {
            method: route.method,
            path: route.path.clone(),
            description: String::new(),
            params,
            samples: Vec::new(),
            handler: route.handler.name().map(str::to_string),
        };
        if let Some(docs) = &route.docs {
            doc.apply_route_docs(docs);
        }
        doc
    }

    /// Whether this route is served by endpoint `handler`
    #[must_use]
    pub fn is_handled_by(&self, handler: &str) -> bool {
        self.handler.as_deref() == Some(handler)
    }

    /// Add a parameter or update the one already documented
    ///
    /// `required: None` keeps an existing state and defaults a new param to
    /// `NO`. A description only overwrites when non-empty. Route params are
    /// never created here, only updated.
    pub fn create_or_update_param(
        &mut self,
        location: ParamLocation,
        name: &str,
        required: Option<RequiredState>,
        description: Option<&str>,
    ) {
        let description = description.filter(|d| !d.is_empty());

        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|p| p.location == location && p.name == name)
        {
            if let Some(description) = description {
                existing.description = description.to_string();
            }
            if let Some(required) = required {
                existing.required = required;
            }
        } else if location != ParamLocation::Route {
            let mut param = ClayParam::new(location, name, required.unwrap_or_default());
            param.description = description.unwrap_or_default().to_string();
            self.params.push(param);
        }
    }

    /// Apply route docs: description, described params and samples
    pub fn apply_route_docs(&mut self, docs: &RouteDocs) {
        if let Some(description) = &docs.description {
            self.description.clone_from(description);
        }

        for (location, entries) in docs.params.by_location() {
            let required = (location == ParamLocation::Route).then_some(RequiredState::Yes);
            for (name, description) in entries {
                self.create_or_update_param(location, name, required, Some(description.as_str()));
            }
        }

        self.samples.extend(docs.samples.iter().cloned());
    }

    /// Document the params a validation schema reads
    pub fn apply_validation_schema(&mut self, schema: &ValidationSchema) {
        for location in Location::ALL {
            let param_location = ParamLocation::from(location);
            match schema.get(location) {
                Some(Validatable::Keys(entries)) => {
                    for entry in entries {
                        match entry {
                            SchemaEntry::Key(key) => {
                                self.create_or_update_param(param_location, key, Some(RequiredState::Yes), None);
                            }
                            SchemaEntry::Entity(entity) => {
                                for (key, requirement) in entity.requirements().iter() {
                                    if !requirement.applies_to(self.method) {
                                        continue;
                                    }
                                    let required = if requirement.rule.required_if.is_some() {
                                        RequiredState::Sometimes
                                    } else {
                                        RequiredState::Yes
                                    };
                                    self.create_or_update_param(param_location, key, Some(required), None);
                                }
                            }
                        }
                    }
                }
                Some(Validatable::Rules(rules)) => {
                    for (key, rule) in rules {
                        let required = if rule.required_if.is_some() {
                            RequiredState::Sometimes
                        } else if rule.required {
                            RequiredState::Yes
                        } else {
                            RequiredState::No
                        };
                        self.create_or_update_param(param_location, key, Some(required), None);
                    }
                }
                None => {}
            }
        }
    }

    /// Whether neither a description nor any param has been documented
    #[must_use]
    pub fn is_undocumented(&self) -> bool {
        self.description.is_empty() && self.params.is_empty()
    }
}
