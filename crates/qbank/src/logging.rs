//! Subscriber setup and log routing.
//!
//! The store and database layers log through the `log` facade while the
//! processing paths emit tracing spans; both end up on the same
//! subscriber. Safe to call more than once — later calls are no-ops.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber: `RUST_LOG`-controlled filtering
/// (default `info`) with a compact stdout formatter, plus the bridge for
/// `log`-based records.
pub fn init_logging() {
    // Bridge `log` macros from the store/db layers into tracing.
    let _ = tracing_log::LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact());

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
