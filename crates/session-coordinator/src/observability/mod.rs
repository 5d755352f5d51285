//! Observability for the session coordinator.
//!
//! - [`metrics`]: recording functions over the `metrics` facade. The library
//!   never installs a recorder; the embedding application chooses one.
//! - [`init_tracing`]: optional subscriber setup for embedding applications.

pub mod metrics;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global `tracing` subscriber with an `EnvFilter` and `fmt` layer.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (for example `"session_coordinator=debug"`).
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
