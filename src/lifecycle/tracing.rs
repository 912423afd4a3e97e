//! Tracing setup for the whole system.
//!
//! Structured logging via the `tracing` crate, configured through `RUST_LOG`.
//! The compact format keeps one line per event while the structured fields
//! (`order_id`, `driver_id`, `routing_key`, ...) stay filterable.
//!
//! ```bash
//! RUST_LOG=info cargo run      # lifecycle events
//! RUST_LOG=debug cargo run     # full payloads and duplicate/suppression traces
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
