//! # Request Forwarding
//!
//! Lets an endpoint hand its request to another registered service's
//! endpoint. The `ForwardTo` hook records the target on the request; a
//! handler then calls [`forward`], optionally replacing parts of the request.

use crate::dispatcher::ServiceEntry;
use crate::error::{Error, Result};
use crate::request::{Request, RequestOverrides};
use crate::response::Reply;
use std::sync::Arc;
use tracing::debug;

/// Where a forwarded request goes, stored in the request state
#[derive(Clone)]
pub struct ForwardTarget {
    /// Structural key of the target service
    pub service_key: String,
    /// Target endpoint name
    pub handler: String,
    /// The target service, if registered for this request
    pub service: Option<Arc<dyn ServiceEntry>>,
}

impl std::fmt::Debug for ForwardTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardTarget")
            .field("service_key", &self.service_key)
            .field("handler", &self.handler)
            .field("service", &self.service.as_ref().map(|entry| entry.name()))
            .finish()
    }
}

/// Invoke the forward target recorded on `req`
///
/// The target sees `req` with the `overrides` fields replaced and shares its
/// state bag.
///
/// # Errors
///
/// - `Error::NoForwardTarget` if no `ForwardTo` hook ran for this request
/// - `Error::ServiceNotRegistered` if the target service was not attached
///   ahead of the forwarding one
/// - `Error::UnknownHandler` if the target has no such endpoint
/// - whatever the target endpoint returns
pub async fn forward(req: &Request, overrides: RequestOverrides) -> Result<Reply> {
    let target = req
        .state()
        .get_typed::<ForwardTarget>()
        .ok_or(Error::NoForwardTarget)?;
    let service = target.service.ok_or_else(|| Error::ServiceNotRegistered {
        key: target.service_key.clone(),
    })?;

    debug!(service = service.name(), endpoint = %target.handler, "Forwarding request");
    let call = service
        .invoke(&target.handler, req.merged(overrides))
        .ok_or_else(|| Error::UnknownHandler {
            service: service.name(),
            handler: target.handler.clone(),
        })?;
    call.await
}
