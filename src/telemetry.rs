//! Log subscriber setup for binaries.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// True when `SCAN_DEBUG` is set
pub fn debug_enabled() -> bool {
    *DEBUG_ENABLED.get_or_init(|| std::env::var("SCAN_DEBUG").is_ok())
}

/// Default filter directive when `RUST_LOG` is not set
pub fn default_directive() -> &'static str {
    if debug_enabled() {
        "info,barcode_live=debug"
    } else {
        "info"
    }
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`.
///
/// Calling it again, or after another subscriber was installed, has no effect.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
