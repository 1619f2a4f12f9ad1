//! Logging bootstrap.
//!
//! The runtime emits structured `tracing` events everywhere; this helper
//! installs a formatted subscriber honoring `RUST_LOG`. Binaries call it
//! once at startup; embedding applications that install their own
//! subscriber skip it.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber. Safe to call more than once: later
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
