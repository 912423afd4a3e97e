//! Typed client handles wrapping each service's request channel.
//!
//! Services never expose raw message passing; these wrappers do the oneshot
//! plumbing and error mapping.

pub mod delivery_client;
pub mod notification_client;
pub mod order_desk_client;

pub use delivery_client::DeliveryClient;
pub use notification_client::NotificationClient;
pub use order_desk_client::OrderDeskClient;

/// Errors raised by the client plumbing itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ClientError {
    /// The service task is gone and its channel is closed.
    #[error("service closed")]
    ServiceClosed,
    /// The service dropped the response channel without answering.
    #[error("service dropped response channel")]
    ServiceDropped,
}
