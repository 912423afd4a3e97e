//! # Tez Delivery
//!
//! > An event-choreographed food delivery system on Tokio.
//!
//! Independent services fulfill food orders by talking only through a
//! topic-based publish/subscribe bus: choreography, no central orchestrator.
//! Each service is a single Tokio task that owns its state outright and
//! processes messages sequentially, so there are no locks anywhere: a
//! check-then-mutate sequence inside one handler has no await point and is
//! therefore atomic.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Bus ([`bus`])
//! An in-process durable topic exchange: exact-match routing-key bindings,
//! fan-out copies per bound queue, ack-on-success with bounded redelivery and
//! a dead-letter store. Consumers must tolerate duplicates (at-least-once).
//!
//! ### 2. The Model ([`model`])
//! Pure data: [`Order`](model::Order) and its status state machine, drivers,
//! restaurants. Order snapshots double as the JSON wire format.
//!
//! ### 3. The Services ([`origination`], [`kitchen`], [`delivery`], [`notifications`])
//! - **Order desk**: validates, prices, estimates, publishes `order.created`,
//!   and offers the client-facing cancel (PENDING/CONFIRMED only).
//! - **Kitchen**: confirms, simulates preparation with progress checkpoints,
//!   and emits `order.ready`, unless a cancellation won the race.
//! - **Delivery**: claims a driver from the bounded pool (atomic single-owner
//!   reservation), simulates transit, and releases the driver on every exit
//!   path. Ready orders without a free driver are requeued, never dropped.
//! - **Notifications**: a pure projection from order status to SMS/push/email
//!   sends, with an append-only receipt history.
//!
//! ### 4. The Interface ([`clients`])
//! Typed client handles wrapping each service's request channel; no raw
//! message passing is exposed.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! [`DeliverySystem`](lifecycle::DeliverySystem) spawns the exchange,
//! declares the queue/binding layout, seeds the sample data, starts every
//! service and shuts the whole thing down gracefully.
//!
//! ## 🚀 Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```
//!
//! ## 🧪 Testing
//!
//! ```bash
//! cargo test
//! ```
//!
//! Integration tests bind their own observer queue to every routing key and
//! assert on the exact event sequence an order produces.

pub mod bus;
pub mod clients;
pub mod config;
pub mod delivery;
pub mod kitchen;
pub mod lifecycle;
pub mod model;
pub mod notifications;
pub mod origination;
