//! Order snapshot and the status state machine.
//!
//! Every bus message carries a full [`Order`] snapshot serialized as a JSON
//! object with camelCase keys, so the struct doubles as the wire format.
//! Status transitions are monotonic along the happy path; cancellation is the
//! only transition allowed from any non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::DriverSnapshot;

/// Lifecycle states of an order.
///
/// `Delivered` and `Cancelled` are terminal: no outbound transitions exist
/// from either. `OnTheWay` is a purely local transition inside the delivery
/// workflow and has no routing key of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The client-facing cancellation rule. Stricter than the bus-level
    /// broadcast, which every downstream service honors regardless of the
    /// status it locally sees.
    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// The next state on the happy path, if any.
    fn successor(self) -> Option<OrderStatus> {
        use OrderStatus::*;
        match self {
            Pending => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(Ready),
            Ready => Some(PickedUp),
            PickedUp => Some(OnTheWay),
            OnTheWay => Some(Delivered),
            Delivered | Cancelled => None,
        }
    }

    /// Whether `next` is a legal transition from `self`: one step forward on
    /// the happy path, or `Cancelled` from any non-terminal state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if next == OrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.successor() == Some(next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::OnTheWay => "ON_THE_WAY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ordered dish. Prices are integer minor units (e.g. som), so the
/// total is exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: u64,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: u32, price: u64) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
        }
    }
}

/// Where the order goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub address: String,
}

impl DeliveryAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Full order snapshot, passed between services inside every bus message.
///
/// `total_amount` is computed once at creation and never recomputed. The
/// per-transition timestamps are stamped by [`Order::advance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub customer_id: String,
    pub customer_name: String,
    pub phone_number: String,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub status: OrderStatus,
    /// Average preparation time of the restaurant, in (simulated) minutes.
    pub preparation_time: u32,
    pub estimated_delivery_time: DateTime<Utc>,
    pub total_amount: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preparing_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_the_way_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Snapshot of the assigned driver, set by the delivery workflow at
    /// pickup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverSnapshot>,
}

/// Attempted transition that the state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal order transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Order {
    /// Sum of price × quantity over the line items.
    pub fn compute_total(items: &[LineItem]) -> u64 {
        items.iter().map(|i| i.price * u64::from(i.quantity)).sum()
    }

    /// Moves the order to `next`, stamping the matching transition timestamp.
    ///
    /// Rejects anything that is not one step forward on the happy path or a
    /// cancellation from a non-terminal state.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), IllegalTransition> {
        if !self.status.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            OrderStatus::Confirmed => self.confirmed_at = Some(now),
            OrderStatus::Preparing => self.preparing_started_at = Some(now),
            OrderStatus::Ready => self.ready_at = Some(now),
            OrderStatus::PickedUp => self.picked_up_at = Some(now),
            OrderStatus::OnTheWay => self.on_the_way_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            OrderStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// First eight characters of the id, used in customer-facing messages.
    pub fn short_id(&self) -> &str {
        let end = self.order_id.len().min(8);
        &self.order_id[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            order_id: "11112222-3333-4444-5555-666677778888".into(),
            restaurant_id: "rest-1".into(),
            restaurant_name: "Osh Markazi".into(),
            customer_id: "cust-1".into(),
            customer_name: "Aziza".into(),
            phone_number: "+998901112233".into(),
            items: vec![LineItem::new("Osh", 2, 25_000), LineItem::new("Somsa", 3, 5_000)],
            delivery_address: DeliveryAddress::new("Amir Temur 1"),
            status: OrderStatus::Pending,
            preparation_time: 30,
            estimated_delivery_time: Utc::now(),
            total_amount: 65_000,
            created_at: Utc::now(),
            confirmed_at: None,
            preparing_started_at: None,
            ready_at: None,
            picked_up_at: None,
            on_the_way_at: None,
            delivered_at: None,
            cancelled_at: None,
            driver: None,
        }
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let items = vec![LineItem::new("Osh", 2, 25_000), LineItem::new("Somsa", 3, 5_000)];
        assert_eq!(Order::compute_total(&items), 65_000);
    }

    #[test]
    fn happy_path_is_monotonic_and_stamps_timestamps() {
        let mut order = sample_order();
        let path = [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::PickedUp,
            OrderStatus::OnTheWay,
            OrderStatus::Delivered,
        ];
        for next in path {
            order.advance(next).expect("happy path step should be legal");
        }
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.confirmed_at.unwrap() <= order.preparing_started_at.unwrap());
        assert!(order.preparing_started_at.unwrap() <= order.ready_at.unwrap());
        assert!(order.ready_at.unwrap() <= order.delivered_at.unwrap());
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let mut order = sample_order();
        let err = order.advance(OrderStatus::Ready).unwrap_err();
        assert_eq!(err.from, OrderStatus::Pending);
        assert_eq!(order.status, OrderStatus::Pending, "failed advance must not mutate");
    }

    #[test]
    fn cancellation_is_legal_from_any_non_terminal_state() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::PickedUp,
            OrderStatus::OnTheWay,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
        }
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_outbound_transitions() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::PickedUp,
                OrderStatus::OnTheWay,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ] {
                assert!(!status.can_transition_to(next), "{status} -> {next}");
            }
        }
    }

    #[test]
    fn wire_format_uses_camel_case_and_screaming_status() {
        let order = sample_order();
        let json = serde_json::to_value(&order).expect("order must serialize");
        assert_eq!(json["orderId"], order.order_id);
        assert_eq!(json["totalAmount"], 65_000);
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("confirmedAt").is_none(), "unset timestamps are omitted");
        let back: Order = serde_json::from_value(json).expect("order must round-trip");
        assert_eq!(back, order);
    }
}
