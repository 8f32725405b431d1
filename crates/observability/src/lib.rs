//! Observability wiring (tracing/logging).

pub mod tracing;

pub use tracing::{init, init_with_filter};
