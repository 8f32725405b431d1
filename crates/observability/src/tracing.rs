//! Tracing/logging initialization.
//!
//! JSON-structured logs, filterable via `RUST_LOG`. Kept separate from the
//! domain crates so they only ever depend on the `tracing` facade.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    init_with(filter);
}

/// Initialize with an explicit filter directive (e.g. `"debug"` or
/// `"stockmaster_ledger=debug,info"`), ignoring the environment.
pub fn init_with_filter(directives: &str) {
    init_with(EnvFilter::new(directives));
}

fn init_with(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
