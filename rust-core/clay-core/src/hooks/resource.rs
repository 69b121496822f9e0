//! Resource views.

use super::Decorator;
use crate::error::Result;
use crate::handler::Handler;
use crate::response::Reply;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Reshapes one key of the reply body through the view type `R`
///
/// `body[key]` (or each element, when it is an array) is read into `R` and
/// written back, so only the fields `R` declares reach the client. Missing
/// and `null` values, redirects and bodyless replies pass through untouched.
pub struct Resource<R> {
    key: Arc<str>,
    view: PhantomData<fn() -> R>,
}

impl<R> Resource<R> {
    /// Project `body[key]` through `R`
    pub fn new(key: &str) -> Self {
        Self {
            key: Arc::from(key),
            view: PhantomData,
        }
    }

    /// The body key this hook rewrites
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S, R> Decorator<S> for Resource<R>
where
    S: Send + Sync + 'static,
    R: Serialize + DeserializeOwned + 'static,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let key = Arc::clone(&self.key);
        Ok(Arc::new(move |service, req| {
            let inner = Arc::clone(&inner);
            let key = Arc::clone(&key);
            Box::pin(async move {
                let reply = inner(service, req).await?;
                project::<R>(reply, &key)
            })
        }))
    }

    fn name(&self) -> &'static str {
        "Resource"
    }
}

fn project<R: Serialize + DeserializeOwned>(reply: Reply, key: &str) -> Result<Reply> {
    let mut response = match reply {
        Reply::Response(response) => response,
        other => return Ok(other),
    };

    if let Some(value) = response.body.as_mut().and_then(|body| body.get_mut(key)) {
        *value = match value.take() {
            Value::Null => Value::Null,
            Value::Array(items) => Value::Array(items.into_iter().map(view::<R>).collect::<Result<_>>()?),
            entity => view::<R>(entity)?,
        };
    }
    Ok(response.into())
}

fn view<R: Serialize + DeserializeOwned>(entity: Value) -> Result<Value> {
    let resource: R = serde_json::from_value(entity)?;
    Ok(serde_json::to_value(resource)?)
}
