//! # Request View
//!
//! Immutable per-request snapshot handed to handlers, hooks and policies.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Request only carries request data; writes go to `RequestState`
//! - **O**: Extensible via the builder without breaking changes
//! - **D**: Does not expose host or hyper types to handlers
//!
//! The view is shared behind an `Arc`; nothing hands out `&mut` access, so
//! once built it cannot change. Forwarding builds a *new* view with
//! [`Request::merged`].

use crate::route::Method;
use crate::state::RequestState;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// String-keyed string map used for headers, query and route params
pub type StringMap = BTreeMap<String, String>;

/// Handle back to the host for the current request
///
/// Exposes the request line, headers and the mutable state bag. Policies are
/// constructed from it.
#[derive(Clone, Debug, Default)]
pub struct HostContext {
    method: Method,
    path: String,
    headers: Arc<StringMap>,
    state: RequestState,
}

impl HostContext {
    /// Build a host context
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, headers: StringMap, state: RequestState) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Arc::new(headers),
            state,
        }
    }

    /// HTTP method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Shared mutable per-request state
    #[must_use]
    pub const fn state(&self) -> &RequestState {
        &self.state
    }
}

#[derive(Debug)]
struct Parts {
    method: Method,
    path: String,
    headers: StringMap,
    query: StringMap,
    params: StringMap,
    body: Value,
    ctx: HostContext,
}

/// Immutable request view
#[derive(Clone, Debug)]
pub struct Request {
    parts: Arc<Parts>,
}

impl Request {
    /// Start building a request
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> Method {
        self.parts.method
    }

    /// Request path (without query string)
    #[must_use]
    pub fn path(&self) -> &str {
        &self.parts.path
    }

    /// All headers, lower-cased names
    #[must_use]
    pub fn headers(&self) -> &StringMap {
        &self.parts.headers
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts
            .headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All query parameters
    #[must_use]
    pub fn query(&self) -> &StringMap {
        &self.parts.query
    }

    /// Query parameter by name
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.parts.query.get(name).map(String::as_str)
    }

    /// Route parameters extracted from the matched path pattern
    #[must_use]
    pub fn params(&self) -> &StringMap {
        &self.parts.params
    }

    /// Route parameter by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parts.params.get(name).map(String::as_str)
    }

    /// Parsed body (`Value::Null` when there is none)
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.parts.body
    }

    /// Top-level body field
    #[must_use]
    pub fn body_field(&self, name: &str) -> Option<&Value> {
        self.parts.body.get(name)
    }

    /// Host context handle
    #[must_use]
    pub fn ctx(&self) -> &HostContext {
        &self.parts.ctx
    }

    /// Shared mutable per-request state
    #[must_use]
    pub fn state(&self) -> &RequestState {
        self.parts.ctx.state()
    }

    /// A new view with the overridden fields replaced wholesale
    ///
    /// The host context (and so the state bag) is shared with `self`.
    #[must_use]
    pub fn merged(&self, overrides: RequestOverrides) -> Self {
        let parts = &self.parts;
        Self {
            parts: Arc::new(Parts {
                method: parts.method,
                path: overrides.path.unwrap_or_else(|| parts.path.clone()),
                headers: overrides.headers.map_or_else(|| parts.headers.clone(), lowercase_keys),
                query: overrides.query.unwrap_or_else(|| parts.query.clone()),
                params: overrides.params.unwrap_or_else(|| parts.params.clone()),
                body: overrides.body.unwrap_or_else(|| parts.body.clone()),
                ctx: parts.ctx.clone(),
            }),
        }
    }
}

/// Builder for [`Request`]
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: StringMap,
    query: StringMap,
    params: StringMap,
    body: Value,
    state: RequestState,
}

impl RequestBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: StringMap::new(),
            query: StringMap::new(),
            params: StringMap::new(),
            body: Value::Null,
            state: RequestState::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replace all headers
    #[must_use]
    pub fn headers(mut self, headers: StringMap) -> Self {
        self.headers = lowercase_keys(headers);
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn query_map(mut self, query: StringMap) -> Self {
        self.query = query;
        self
    }

    /// Add a route parameter
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replace all route parameters
    #[must_use]
    pub fn params(mut self, params: StringMap) -> Self {
        self.params = params;
        self
    }

    /// Set the parsed body
    #[must_use]
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// Share an existing state bag (the host's, usually)
    #[must_use]
    pub fn state(mut self, state: RequestState) -> Self {
        self.state = state;
        self
    }

    /// Finish the view
    #[must_use]
    pub fn build(self) -> Request {
        let ctx = HostContext::new(self.method, self.path.clone(), self.headers.clone(), self.state);
        Request {
            parts: Arc::new(Parts {
                method: self.method,
                path: self.path,
                headers: self.headers,
                query: self.query,
                params: self.params,
                body: self.body,
                ctx,
            }),
        }
    }
}

/// Fields to replace when forwarding a request
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    /// Replacement path
    pub path: Option<String>,
    /// Replacement headers
    pub headers: Option<StringMap>,
    /// Replacement query
    pub query: Option<StringMap>,
    /// Replacement route params
    pub params: Option<StringMap>,
    /// Replacement body
    pub body: Option<Value>,
}

impl RequestOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query
    #[must_use]
    pub fn query<K, V>(mut self, query: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query = Some(query.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Replace the body
    #[must_use]
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Replace the route params
    #[must_use]
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params = Some(params.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Replace the headers
    #[must_use]
    pub fn headers(mut self, headers: StringMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Replace the path
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

fn lowercase_keys(map: StringMap) -> StringMap {
    map.into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}
