//! Shared helpers for the integration tests: a compressed clock and an
//! observer queue bound to every routing key.

use std::time::Duration;

use tez_delivery::bus::{BusClient, QueueReceiver, RoutingKey};
use tez_delivery::config::SimulationConfig;
use tez_delivery::model::{LineItem, Order};
use tez_delivery::origination::CreateOrderRequest;

/// Millisecond-scale clock so a full order completes in well under a second.
pub fn fast_config() -> SimulationConfig {
    SimulationConfig {
        minute: Duration::from_millis(10),
        pickup_delay: Duration::from_millis(10),
        channel_latency: Duration::ZERO,
        redelivery_backoff: Duration::from_millis(5),
        ..SimulationConfig::default()
    }
}

pub fn osh_request() -> CreateOrderRequest {
    CreateOrderRequest {
        restaurant_id: "rest-1".into(),
        customer_id: "cust-1".into(),
        customer_name: "Aziza".into(),
        items: vec![
            LineItem::new("Osh", 2, 25_000),
            LineItem::new("Somsa", 3, 5_000),
        ],
        delivery_address: "Amir Temur 1".into(),
        phone_number: "+998901112233".into(),
    }
}

pub fn pizza_request(customer_id: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        restaurant_id: "rest-2".into(),
        customer_id: customer_id.into(),
        customer_name: "Jasur".into(),
        items: vec![LineItem::new("Margherita", 1, 60_000)],
        delivery_address: "Mustaqillik 5".into(),
        phone_number: "+998907654321".into(),
    }
}

/// Declares an observer queue bound to every order routing key.
pub async fn tap_all(bus: &BusClient, name: &str) -> QueueReceiver {
    let queue = bus.declare_queue(name, 128).await.expect("declare tap queue");
    for key in RoutingKey::ALL {
        bus.bind(name, key).await.expect("bind tap queue");
    }
    queue
}

/// Receives events for `order_id` until `until` shows up, returning the keys
/// seen (including `until`) and the final snapshot. Panics on timeout.
pub async fn events_until(
    tap: &mut QueueReceiver,
    order_id: &str,
    until: RoutingKey,
    deadline: Duration,
) -> (Vec<RoutingKey>, Order) {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(deadline, async {
        loop {
            let delivery = tap.recv().await.expect("tap closed early");
            let order = delivery.order().expect("tap payload must parse");
            if order.order_id != order_id {
                continue;
            }
            seen.push(delivery.routing_key);
            if delivery.routing_key == until {
                return order;
            }
        }
    })
    .await;
    match result {
        Ok(order) => (seen, order),
        Err(_) => panic!("timed out waiting for {until}, saw {seen:?}"),
    }
}

/// Collects every key observed for `order_id` over a fixed window.
pub async fn events_during(
    tap: &mut QueueReceiver,
    order_id: &str,
    window: Duration,
) -> Vec<RoutingKey> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(window, async {
        loop {
            let Some(delivery) = tap.recv().await else { return };
            let order = delivery.order().expect("tap payload must parse");
            if order.order_id == order_id {
                seen.push(delivery.routing_key);
            }
        }
    })
    .await;
    seen
}
