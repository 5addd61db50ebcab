//! Structured logging setup.
//!
//! Grounded on `main.rs`'s `tracing_subscriber::registry()` initialization:
//! an `EnvFilter` driven by `RUST_LOG`, defaulting to `info` for this crate
//! and `warn` for `sqlx`, with a plain `fmt` layer. Library consumers are
//! free to build their own subscriber instead of calling this; it exists
//! for integration tests and any binary embedding this crate that wants
//! the same defaults the original service shipped with.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global subscriber with `RUST_LOG`-driven filtering, defaulting
/// to `secretum=info,sqlx=warn` when unset. Idempotent-safe to call once;
/// calling it twice in the same process panics, matching
/// `tracing_subscriber`'s own global-subscriber contract.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "secretum=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
