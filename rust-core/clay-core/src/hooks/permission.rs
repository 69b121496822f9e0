//! Permission hook.

use super::Decorator;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::policy::{instance, policy_checks, Policy, PolicyResponse};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Runs a named check of policy `P` before the wrapped handler
///
/// A denial fails the chain with `Error::Http`: 403 `"Forbidden"` for a plain
/// deny, or the denial's own status and data.
pub struct HasPermission<P> {
    check: String,
    _policy: PhantomData<fn() -> P>,
}

impl<P: Policy> HasPermission<P> {
    /// Check `check` of policy `P`
    #[must_use]
    pub fn new(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            _policy: PhantomData,
        }
    }
}

impl<S, P> Decorator<S> for HasPermission<P>
where
    S: Send + Sync + 'static,
    P: Policy,
{
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>> {
        let check = policy_checks::<P>()
            .get(&self.check)
            .ok_or_else(|| Error::UnknownPolicyCheck {
                policy: P::name(),
                check: self.check.clone(),
            })?;
        let check_name: Arc<str> = Arc::from(self.check.as_str());

        Ok(Arc::new(move |service, req| {
            let check = Arc::clone(&check);
            let check_name = Arc::clone(&check_name);
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let policy = instance::<P>(req.ctx());
                let response = check(policy, req.clone()).await;
                if response != PolicyResponse::Allow {
                    debug!(policy = P::name(), check = %check_name, path = %req.path(), "Permission denied");
                }
                response.into_result()?;
                inner(service, req).await
            })
        }))
    }

    fn name(&self) -> &'static str {
        "HasPermission"
    }
}
