//! Orchestration layer: wires the exchange, queues and services together and
//! manages startup and graceful shutdown.

pub mod system;
pub mod tracing;

pub use system::{DeliverySystem, SystemError};
pub use tracing::setup_tracing;
