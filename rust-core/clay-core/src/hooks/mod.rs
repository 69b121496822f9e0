//! # Hooks
//!
//! Higher-order wrappers around endpoint handlers.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Each hook adds one behaviour around the handler it wraps
//! - **O**: New hooks implement [`Decorator`]
//! - **D**: Hooks see handlers only through the `Handler<S>` shape
//!
//! An endpoint lists its hooks outermost first, the order they read above
//! the handler. [`compose`] wraps innermost first, so the first hook listed
//! runs its before-logic first and its after-logic last.

mod after;
mod before;
mod forward;
mod permission;
mod resource;
mod validate;

pub use after::{After, AfterHook};
pub use before::{Before, BeforeHook};
pub use forward::ForwardTo;
pub use permission::HasPermission;
pub use resource::Resource;
pub use validate::Validate;

use crate::error::Result;
use crate::handler::Handler;

/// Wraps a handler into a new handler of the same shape
pub trait Decorator<S>: Send + Sync {
    /// Produce the wrapped handler
    ///
    /// # Errors
    ///
    /// Configuration problems found while wrapping (e.g. an unknown policy
    /// check).
    fn wrap(&self, inner: Handler<S>) -> Result<Handler<S>>;

    /// Hook name for debug output
    fn name(&self) -> &'static str;
}

/// Wrap `method` in `decorators`, listed outermost first
///
/// # Errors
///
/// The first error any decorator returns while wrapping.
pub fn compose<S>(method: Handler<S>, decorators: &[Box<dyn Decorator<S>>]) -> Result<Handler<S>> {
    decorators
        .iter()
        .rev()
        .try_fold(method, |handler, decorator| decorator.wrap(handler))
}
