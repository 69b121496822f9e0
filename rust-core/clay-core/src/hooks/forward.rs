//! Forwarding hook.

use super::Decorator;
use crate::dispatcher::ServiceDirectory;
use crate::error::Result;
use crate::forward::ForwardTarget;
use crate::handler::Handler;
use std::sync::Arc;

/// Records a forward target on the request before the wrapped handler runs
///
/// The target service is looked up in the request's service directory, so it
/// must be attached ahead of the forwarding service in the host chain. The
/// reply is left untouched; call [`crate::forward`] from the handler to
/// actually dispatch.
#[derive(Debug, Clone)]
pub struct ForwardTo {
    service_key: String,
    handler: String,
}

impl ForwardTo {
    /// Forward to endpoint `handler` of the service registered under `service_key`
    #[must_use]
    pub fn new(service_key: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            handler: handler.into(),
        }
    }

    /// Structural key of the target service
    #[must_use]
    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    /// Target endpoint name
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }
}

impl<S> Decorator<S> for ForwardTo
where
    S: Send + Sync + 'static,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let target = self.clone();
        Ok(Arc::new(move |service, req| {
            let inner = Arc::clone(&inner);
            let entry = ServiceDirectory::lookup(req.state(), &target.service_key);
            req.state().insert(ForwardTarget {
                service_key: target.service_key.clone(),
                handler: target.handler.clone(),
                service: entry,
            });
            inner(service, req)
        }))
    }

    fn name(&self) -> &'static str {
        "ForwardTo"
    }
}
