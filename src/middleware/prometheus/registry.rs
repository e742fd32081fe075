//! Process-wide default registry.

use std::sync::OnceLock;

use prometheus::Registry;

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The registry instruments land in when no registry is supplied to the
/// builder.
///
/// Initialised on first call and never torn down before process exit. It
/// shares state with [`prometheus::default_registry`], so collectors
/// registered through the `prometheus::register_*!` macros show up on the
/// same scrape. Tests should pass their own [`Registry`] instead.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(|| prometheus::default_registry().clone())
}
