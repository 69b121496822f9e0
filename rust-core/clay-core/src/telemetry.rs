//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Directive added on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVE: &str = "clay=info";

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG` plus `clay=info`
///
/// Returns `false` if a global subscriber was already installed, so calling
/// it more than once is harmless.
pub fn init_tracing() -> bool {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = DEFAULT_DIRECTIVE.parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .is_ok()
}
