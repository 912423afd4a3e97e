//! Error types for the order desk.

use thiserror::Error;

use crate::model::OrderStatus;

/// Errors that can occur while creating, cancelling or querying orders.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    /// The referenced restaurant is not registered.
    #[error("restaurant not found: {0}")]
    RestaurantNotFound(String),

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// The creation request is missing or malforms a required field.
    #[error("invalid order request: {0}")]
    Validation(String),

    /// Client-facing cancellation is only allowed from PENDING or CONFIRMED.
    #[error("order in status {0} cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// Publishing to the bus failed.
    #[error("bus error: {0}")]
    Bus(String),

    /// The order desk task is gone.
    #[error("order desk unavailable")]
    ServiceUnavailable,
}

impl From<crate::bus::BusError> for OrderError {
    fn from(e: crate::bus::BusError) -> Self {
        OrderError::Bus(e.to_string())
    }
}
