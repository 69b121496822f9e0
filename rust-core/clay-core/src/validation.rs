//! # Validation Engine
//!
//! Declarative request validation with multi-error accumulation.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only evaluates schemas; turning errors into a 400 is the `Validate` hook's job
//! - **O**: Custom checks plug in through `Rule::validation`
//! - **L**: Keys, rules and entity requirements all feed the same error map
//!
//! A schema names, per request location (query, body, headers), either a
//! list of required keys and entity types, or an ordered list of
//! `field -> Rule`. Evaluation never fails: problems end up in the returned
//! [`ErrorMap`], which is empty on success.

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::route::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Field name to ordered error messages
pub type ErrorMap = BTreeMap<String, Vec<String>>;

/// Async predicate deciding whether a field is required for this request
pub type RequiredIf = Arc<dyn Fn(Request) -> BoxFuture<'static, bool> + Send + Sync>;

/// Async custom check producing conditions for a present value
pub type ValidationFn = Arc<dyn Fn(Value, Request) -> BoxFuture<'static, Vec<Condition>> + Send + Sync>;

/// Where in the request a field lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Query string
    Query,
    /// Parsed body
    Body,
    /// Headers (case-insensitive)
    Headers,
}

impl Location {
    /// Evaluation order
    pub const ALL: [Self; 3] = [Self::Query, Self::Body, Self::Headers];

    /// Lower-case name used in messages and docs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Body => "body",
            Self::Headers => "headers",
        }
    }

    /// Look a field up; `None` when missing or `null`
    #[must_use]
    pub fn lookup(self, req: &Request, key: &str) -> Option<Value> {
        match self {
            Self::Query => req.query_param(key).map(|v| Value::String(v.to_string())),
            Self::Body => req.body_field(key).filter(|v| !v.is_null()).cloned(),
            Self::Headers => req.header(key).map(|v| Value::String(v.to_string())),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one custom check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Whether the check passed
    pub check: bool,
    /// Message recorded when it did not
    pub error: Option<String>,
    /// Stop checking this field after this condition fails
    pub break_on_fail: bool,
}

impl Condition {
    /// A condition with the default message
    #[must_use]
    pub const fn new(check: bool) -> Self {
        Self {
            check,
            error: None,
            break_on_fail: false,
        }
    }

    /// Set the failure message
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Stop at this condition if it fails
    #[must_use]
    pub const fn break_on_fail(mut self) -> Self {
        self.break_on_fail = true;
        self
    }
}

/// Rule for one field
#[derive(Clone, Default)]
pub struct Rule {
    /// Required when no `required_if` is set
    pub required: bool,
    /// Dynamic required-ness, takes precedence over `required`
    pub required_if: Option<RequiredIf>,
    /// Replaces the missing-field message
    pub error: Option<String>,
    /// Custom checks run when the value is present
    pub validation: Option<ValidationFn>,
}

impl Rule {
    /// An optional field with no checks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A required field
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    /// Decide required-ness per request
    #[must_use]
    pub fn required_if<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.required_if = Some(Arc::new(move |req| Box::pin(predicate(req))));
        self
    }

    /// Custom missing-field message
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Custom checks for a present value
    #[must_use]
    pub fn validation<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Value, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Condition>> + Send + 'static,
    {
        self.validation = Some(Arc::new(move |value, req| Box::pin(check(value, req))));
        self
    }

    async fn apply(
        &self,
        req: &Request,
        location: Location,
        key: &str,
        is_required: bool,
        errors: &mut ErrorMap,
    ) {
        let Some(value) = location.lookup(req, key) else {
            if is_required {
                let message = self
                    .error
                    .clone()
                    .unwrap_or_else(|| missing_message(key, location));
                reject(errors, key, message);
            }
            return;
        };

        let Some(validation) = &self.validation else {
            return;
        };
        for condition in validation(value, req.clone()).await {
            if condition.check {
                continue;
            }
            let message = condition
                .error
                .unwrap_or_else(|| format!("The provided {key} value is invalid"));
            reject(errors, key, message);
            if condition.break_on_fail {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("required", &self.required)
            .field("required_if", &self.required_if.is_some())
            .field("error", &self.error)
            .field("validation", &self.validation.is_some())
            .finish()
    }
}

/// A field requirement declared on an entity type
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Required-if predicate, custom message and checks (`required` is unused)
    pub rule: Rule,
    /// Name to look up and report under instead of the field name
    pub alias: Option<String>,
    /// Methods the requirement applies to
    pub methods: Vec<Method>,
}

impl Default for Requirement {
    fn default() -> Self {
        Self {
            rule: Rule::default(),
            alias: None,
            methods: vec![Method::Post, Method::Put],
        }
    }
}

impl Requirement {
    /// Required on `POST` and `PUT`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up and report under `alias`
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Methods the requirement applies to
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Decide required-ness per request
    #[must_use]
    pub fn required_if<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.rule = self.rule.required_if(predicate);
        self
    }

    /// Custom missing-field message
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.rule = self.rule.error(error);
        self
    }

    /// Custom checks for a present value
    #[must_use]
    pub fn validation<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Value, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Condition>> + Send + 'static,
    {
        self.rule = self.rule.validation(check);
        self
    }

    /// Whether the requirement applies to `method`
    #[must_use]
    pub fn applies_to(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }
}

/// Ordered requirements of one entity type, keyed by effective name
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    entries: Vec<(String, Requirement)>,
}

impl Requirements {
    /// Declare a requirement for `field`
    ///
    /// The effective key is the alias when one is set; declaring the same
    /// key twice replaces the earlier requirement in place.
    pub fn field(&mut self, field: &str, requirement: Requirement) -> &mut Self {
        let key = requirement.alias.clone().unwrap_or_else(|| field.to_string());
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = requirement;
        } else {
            self.entries.push((key, requirement));
        }
        self
    }

    /// Requirements in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requirement)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Number of requirements
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is required
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A data type whose fields carry request requirements
///
/// # Example
///
/// ```ignore
/// struct NewUser;
///
/// impl Entity for NewUser {
///     fn requirements(req: &mut Requirements) {
///         req.field("name", Requirement::new());
///         req.field("email_address", Requirement::new().alias("email"));
///     }
/// }
/// ```
pub trait Entity: 'static {
    /// Register field requirements
    fn requirements(requirements: &mut Requirements);
}

/// Type-erased reference to an [`Entity`]
#[derive(Clone, Copy)]
pub struct EntityRef {
    name: &'static str,
    build: fn(&mut Requirements),
}

impl EntityRef {
    /// Reference entity type `E`
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            name: std::any::type_name::<E>(),
            build: E::requirements,
        }
    }

    /// Type name of the entity
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Collect the entity's requirements
    #[must_use]
    pub fn requirements(&self) -> Requirements {
        let mut requirements = Requirements::default();
        (self.build)(&mut requirements);
        requirements
    }
}

impl std::fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityRef").field(&self.name).finish()
    }
}

/// Entry of a key-list schema
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    /// Plain required key
    Key(String),
    /// Requirements of an entity type
    Entity(EntityRef),
}

impl SchemaEntry {
    /// Entry for entity type `E`
    #[must_use]
    pub fn entity<E: Entity>() -> Self {
        Self::Entity(EntityRef::of::<E>())
    }
}

impl From<&str> for SchemaEntry {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for SchemaEntry {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// Validation for one request location
#[derive(Debug, Clone)]
pub enum Validatable {
    /// Required keys and entity references
    Keys(Vec<SchemaEntry>),
    /// Ordered field rules
    Rules(Vec<(String, Rule)>),
}

impl Validatable {
    /// Key-list form
    #[must_use]
    pub fn keys<E: Into<SchemaEntry>>(entries: impl IntoIterator<Item = E>) -> Self {
        Self::Keys(entries.into_iter().map(Into::into).collect())
    }

    /// Rules form
    #[must_use]
    pub fn rules<K: Into<String>>(rules: impl IntoIterator<Item = (K, Rule)>) -> Self {
        Self::Rules(rules.into_iter().map(|(k, r)| (k.into(), r)).collect())
    }
}

/// What to validate, per location
#[derive(Debug, Clone, Default)]
pub struct ValidationSchema {
    /// Query string
    pub query: Option<Validatable>,
    /// Body
    pub body: Option<Validatable>,
    /// Headers
    pub headers: Option<Validatable>,
}

impl ValidationSchema {
    /// An empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query validation
    #[must_use]
    pub fn query(mut self, validatable: Validatable) -> Self {
        self.query = Some(validatable);
        self
    }

    /// Set the body validation
    #[must_use]
    pub fn body(mut self, validatable: Validatable) -> Self {
        self.body = Some(validatable);
        self
    }

    /// Set the header validation
    #[must_use]
    pub fn headers(mut self, validatable: Validatable) -> Self {
        self.headers = Some(validatable);
        self
    }

    /// Validation configured for `location`
    #[must_use]
    pub const fn get(&self, location: Location) -> Option<&Validatable> {
        match location {
            Location::Query => self.query.as_ref(),
            Location::Body => self.body.as_ref(),
            Location::Headers => self.headers.as_ref(),
        }
    }
}

/// Validate `req` against `schema`
///
/// Locations run in the order query, body, headers. An empty map means the
/// request is valid.
pub async fn validate(req: &Request, schema: &ValidationSchema) -> ErrorMap {
    let mut errors = ErrorMap::new();

    for location in Location::ALL {
        match schema.get(location) {
            Some(Validatable::Keys(entries)) => {
                check_keys(req, location, entries, &mut errors).await;
            }
            Some(Validatable::Rules(rules)) => {
                for (key, rule) in rules {
                    let is_required = match &rule.required_if {
                        Some(predicate) => predicate(req.clone()).await,
                        None => rule.required,
                    };
                    rule.apply(req, location, key, is_required, &mut errors).await;
                }
            }
            None => {}
        }
    }

    errors
}

async fn check_keys(req: &Request, location: Location, entries: &[SchemaEntry], errors: &mut ErrorMap) {
    for entry in entries {
        match entry {
            SchemaEntry::Key(key) => {
                if location.lookup(req, key).is_none() {
                    reject(errors, key, missing_message(key, location));
                }
            }
            SchemaEntry::Entity(entity) => {
                for (key, requirement) in entity.requirements().iter() {
                    let is_required = match &requirement.rule.required_if {
                        Some(predicate) => predicate(req.clone()).await,
                        None => requirement.applies_to(req.method()),
                    };
                    requirement
                        .rule
                        .apply(req, location, key, is_required, errors)
                        .await;
                }
            }
        }
    }
}

/// Error map as a JSON object of string arrays
#[must_use]
pub fn error_map_to_value(errors: &ErrorMap) -> Value {
    Value::Object(
        errors
            .iter()
            .map(|(key, messages)| {
                let messages = messages.iter().cloned().map(Value::String).collect();
                (key.clone(), Value::Array(messages))
            })
            .collect(),
    )
}

fn missing_message(key: &str, location: Location) -> String {
    format!("{key} is missing from the request {location}")
}

fn reject(errors: &mut ErrorMap, key: &str, message: String) {
    errors.entry(key.to_string()).or_default().push(message);
}
