//! Pure projection from an order snapshot to the notifications it triggers.

use serde::{Deserialize, Serialize};

use crate::model::{Order, OrderStatus};

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Sms,
    Email,
    Push,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Channel::Sms => "SMS",
            Channel::Email => "EMAIL",
            Channel::Push => "PUSH",
        };
        f.write_str(s)
    }
}

/// One message to send: channel, recipient and content.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub channel: Channel,
    pub recipient: String,
    pub title: Option<String>,
    pub body: String,
}

impl Notification {
    fn sms(recipient: &str, body: String) -> Self {
        Self {
            channel: Channel::Sms,
            recipient: recipient.to_string(),
            title: None,
            body,
        }
    }

    fn push(recipient: &str, title: &str, body: String) -> Self {
        Self {
            channel: Channel::Push,
            recipient: recipient.to_string(),
            title: Some(title.to_string()),
            body,
        }
    }

    fn email(recipient: String, subject: &str, body: String) -> Self {
        Self {
            channel: Channel::Email,
            recipient,
            title: Some(subject.to_string()),
            body,
        }
    }
}

/// Maps an order snapshot to the ordered list of notifications for its
/// current status. Pure function of the snapshot; dispatch and bookkeeping
/// live in the service.
pub fn plan(order: &Order) -> Vec<Notification> {
    let short_id = order.short_id();
    match order.status {
        OrderStatus::Pending | OrderStatus::Confirmed => vec![
            Notification::sms(
                &order.phone_number,
                format!(
                    "Hello {}! Your order #{short_id} was received. {} is on it.",
                    order.customer_name, order.restaurant_name
                ),
            ),
            Notification::push(
                &order.customer_id,
                "Order received",
                format!("{} is preparing your order", order.restaurant_name),
            ),
        ],
        OrderStatus::Preparing => vec![Notification::push(
            &order.customer_id,
            "Order in progress",
            "Our cooks are working on your order".to_string(),
        )],
        OrderStatus::Ready => vec![
            Notification::sms(
                &order.phone_number,
                format!("Your order #{short_id} is ready! A courier is on the way."),
            ),
            Notification::push(
                &order.customer_id,
                "Order ready!",
                "A courier is on the way and will arrive shortly.".to_string(),
            ),
        ],
        OrderStatus::PickedUp | OrderStatus::OnTheWay => match &order.driver {
            Some(driver) => vec![
                Notification::sms(
                    &order.phone_number,
                    format!("{} picked up your order and is heading out.", driver.name),
                ),
                Notification::push(
                    &order.customer_id,
                    "On the way!",
                    format!("Courier: {} ({})", driver.name, driver.vehicle_type),
                ),
            ],
            None => vec![Notification::push(
                &order.customer_id,
                "On the way!",
                "Your order is on the way.".to_string(),
            )],
        },
        OrderStatus::Delivered => vec![
            Notification::sms(
                &order.phone_number,
                "Your order was delivered. Thank you!".to_string(),
            ),
            Notification::email(
                format!("{}@example.com", order.customer_id),
                "Order delivered",
                format!(
                    "Dear {}, your order was delivered successfully.",
                    order.customer_name
                ),
            ),
        ],
        OrderStatus::Cancelled => vec![
            Notification::sms(
                &order.phone_number,
                format!("Your order #{short_id} was cancelled."),
            ),
            Notification::push(
                &order.customer_id,
                "Order cancelled",
                "Your order was cancelled".to_string(),
            ),
        ],
    }
}
