//! Validation hook.

use super::Decorator;
use crate::error::Result;
use crate::handler::Handler;
use crate::response::{Reply, Response};
use crate::validation::{error_map_to_value, validate, ValidationSchema};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// State key holding the last validation's error map
pub const ERRORS_STATE_KEY: &str = "errors";

/// Gates the wrapped handler on a validation schema
///
/// On failure the chain answers `400 { "errors": { field: [messages] } }`
/// and the wrapped handler (with any hooks inside it) does not run. The
/// error map is also left in the request state under `errors`.
#[derive(Debug, Clone)]
pub struct Validate {
    schema: Arc<ValidationSchema>,
}

impl Validate {
    /// Validate against `schema`
    #[must_use]
    pub fn new(schema: ValidationSchema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// The shared schema
    #[must_use]
    pub const fn schema(&self) -> &Arc<ValidationSchema> {
        &self.schema
    }
}

impl<S> Decorator<S> for Validate
where
    S: Send + Sync + 'static,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let schema = Arc::clone(&self.schema);
        Ok(Arc::new(move |service, req| {
            let schema = Arc::clone(&schema);
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let errors = validate(&req, &schema).await;
                let value = error_map_to_value(&errors);
                req.state().set(ERRORS_STATE_KEY, value.clone());

                if errors.is_empty() {
                    return inner(service, req).await;
                }

                debug!(path = %req.path(), fields = errors.len(), "Validation failed");
                let mut body = Map::new();
                body.insert(ERRORS_STATE_KEY.to_string(), value);
                Ok(Reply::from(Response::new(400).with_body(Value::Object(body))))
            })
        }))
    }

    fn name(&self) -> &'static str {
        "Validate"
    }
}
