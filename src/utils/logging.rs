//! Structured logging setup.
//!
//! The crate itself only emits `tracing` events; installing a subscriber
//! is the embedding application's call. This helper wires up a sensible
//! default for binaries and tests that do not bring their own.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
