//! Logging bootstrap for hosts embedding the performance API.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns false if a
/// global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
}
