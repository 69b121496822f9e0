//! # Permission Policies
//!
//! A policy is built from the host context and exposes named async checks.
//! `HasPermission` hooks run one check before the wrapped handler.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Policies decide; the hook enforces
//! - **O**: New checks are registered, not matched on
//! - **I**: A check only sees the policy and the request
//!
//! One instance per policy type is built lazily per request and cached in
//! the request state, so several checks in one chain share it.

use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::request::{HostContext, Request};
use crate::service::short_type_name;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Status used by a bare denial
pub const FORBIDDEN: u16 = 403;

/// Denial with a chosen status and payload
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDenial {
    /// HTTP status, 403 unless set
    pub status: u16,
    /// Payload sent to the client
    pub data: Value,
}

impl PolicyDenial {
    /// A 403 denial carrying `data`
    #[must_use]
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            status: FORBIDDEN,
            data: data.into(),
        }
    }

    /// Use `status` instead of 403
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyResponse {
    /// Continue to the wrapped handler
    Allow,
    /// Reject with 403
    Deny,
    /// Reject with the denial's status and data
    Denial(PolicyDenial),
}

impl PolicyResponse {
    /// `Ok` to continue, `Err(Error::Http)` to reject
    ///
    /// # Errors
    ///
    /// `Deny` yields a 403 `"Forbidden"`, `Denial` its own status and data.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(Error::http(FORBIDDEN, "Forbidden")),
            Self::Denial(denial) => Err(Error::http(denial.status, denial.data)),
        }
    }
}

impl From<bool> for PolicyResponse {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl From<PolicyDenial> for PolicyResponse {
    fn from(denial: PolicyDenial) -> Self {
        Self::Denial(denial)
    }
}

/// A named check of policy `P`
pub type PolicyCheck<P> = Arc<dyn Fn(Arc<P>, Request) -> BoxFuture<'static, PolicyResponse> + Send + Sync>;

/// Registry of a policy's checks
pub struct PolicyChecks<P> {
    checks: BTreeMap<String, PolicyCheck<P>>,
}

impl<P> PolicyChecks<P>
where
    P: Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            checks: BTreeMap::new(),
        }
    }

    /// Register a check under `name`
    ///
    /// The check may return `bool`, `PolicyDenial` or `PolicyResponse`.
    pub fn check<F, Fut, R>(&mut self, name: &str, check: F) -> &mut Self
    where
        F: Fn(Arc<P>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<PolicyResponse>,
    {
        let check = Arc::new(check);
        self.checks.insert(
            name.to_string(),
            Arc::new(move |policy, req| {
                let fut = check(policy, req);
                Box::pin(async move { fut.await.into() })
            }),
        );
        self
    }

    /// Look up a check
    #[must_use]
    pub fn get(&self, name: &str) -> Option<PolicyCheck<P>> {
        self.checks.get(name).cloned()
    }

    /// Registered check names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}

/// A permission policy
///
/// # Example
///
/// ```ignore
/// struct SecretsPolicy { api_key: Option<String> }
///
/// impl Policy for SecretsPolicy {
///     fn from_context(ctx: &HostContext) -> Self {
///         Self { api_key: ctx.header("x-api-key").map(str::to_string) }
///     }
///
///     fn checks(checks: &mut PolicyChecks<Self>) {
///         checks.check("index", |policy, _req| async move { policy.api_key.is_some() });
///     }
/// }
/// ```
pub trait Policy: Send + Sync + Sized + 'static {
    /// Build the policy for one request
    fn from_context(ctx: &HostContext) -> Self;

    /// Register the policy's checks
    fn checks(checks: &mut PolicyChecks<Self>);

    /// Name used in errors and logs
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Collect the checks of policy `P`
#[must_use]
pub fn policy_checks<P: Policy>() -> PolicyChecks<P> {
    let mut checks = PolicyChecks::new();
    P::checks(&mut checks);
    checks
}

/// The request's instance of policy `P`, built on first use
#[must_use]
pub fn instance<P: Policy>(ctx: &HostContext) -> Arc<P> {
    ctx.state()
        .get_or_insert_with::<Arc<P>, _>(|| Arc::new(P::from_context(ctx)))
}
