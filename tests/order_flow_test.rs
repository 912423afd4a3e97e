//! End-to-end happy path: one order flowing through every service.

mod common;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tez_delivery::bus::RoutingKey;
use tez_delivery::lifecycle::DeliverySystem;
use tez_delivery::model::{Order, OrderStatus};
use tez_delivery::notifications::Channel;

use common::{events_during, events_until, fast_config, osh_request, tap_all};

fn assert_non_decreasing(stamps: &[Option<DateTime<Utc>>]) {
    let mut last = None;
    for stamp in stamps.iter().flatten() {
        if let Some(previous) = last {
            assert!(stamp >= previous, "timestamps must be non-decreasing");
        }
        last = Some(stamp);
    }
}

#[tokio::test]
async fn happy_path_runs_the_full_event_sequence() {
    let system = DeliverySystem::start(fast_config()).await.expect("start system");
    let mut tap = tap_all(&system.bus, "flow_tap").await;

    let order = system.orders.create_order(osh_request()).await.expect("create order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 65_000);
    assert_eq!(order.preparation_time, 30);

    let (keys, delivered) = events_until(
        &mut tap,
        &order.order_id,
        RoutingKey::OrderDelivered,
        Duration::from_secs(10),
    )
    .await;

    assert_eq!(
        keys,
        [
            RoutingKey::OrderCreated,
            RoutingKey::OrderConfirmed,
            RoutingKey::OrderPreparing,
            RoutingKey::OrderReady,
            RoutingKey::OrderPickedUp,
            RoutingKey::OrderDelivered,
        ]
    );

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_non_decreasing(&[
        Some(delivered.created_at),
        delivered.confirmed_at,
        delivered.preparing_started_at,
        delivered.ready_at,
        delivered.picked_up_at,
        delivered.on_the_way_at,
        delivered.delivered_at,
    ]);

    let driver = delivered.driver.expect("delivered order carries a driver snapshot");
    assert_eq!(driver.id, "driver-1", "first allocation takes the first registered driver");

    // The driver was released before order.delivered went out.
    let drivers = system.delivery.driver_status().await.expect("driver status");
    assert!(drivers.iter().all(|d| d.available && d.current_order.is_none()));

    // Every status reached the notification dispatcher with its mapping.
    let history = system.notifications.history().await.expect("history");
    let channels_for = |status: OrderStatus| {
        history
            .iter()
            .filter(|r| r.order_id == order.order_id && r.status == status)
            .map(|r| r.channel)
            .collect::<Vec<_>>()
    };
    assert_eq!(channels_for(OrderStatus::Pending), [Channel::Sms, Channel::Push]);
    assert_eq!(channels_for(OrderStatus::Preparing), [Channel::Push]);
    assert_eq!(channels_for(OrderStatus::Delivered), [Channel::Sms, Channel::Email]);
    assert!(history.iter().all(|r| r.success));

    drop(tap);
    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn released_driver_takes_the_next_order() {
    let system = DeliverySystem::start(fast_config()).await.expect("start system");
    let mut tap = tap_all(&system.bus, "reuse_tap").await;

    let first = system.orders.create_order(osh_request()).await.expect("first order");
    let (_, delivered) = events_until(
        &mut tap,
        &first.order_id,
        RoutingKey::OrderDelivered,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(delivered.driver.expect("driver").id, "driver-1");

    let second = system.orders.create_order(osh_request()).await.expect("second order");
    let (_, picked_up) = events_until(
        &mut tap,
        &second.order_id,
        RoutingKey::OrderPickedUp,
        Duration::from_secs(10),
    )
    .await;
    assert_eq!(
        picked_up.driver.expect("driver").id,
        "driver-1",
        "the released driver is first in the scan again"
    );

    drop(tap);
    system.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn duplicate_ready_event_allocates_exactly_one_driver() {
    let system = DeliverySystem::start(fast_config()).await.expect("start system");
    let mut tap = tap_all(&system.bus, "dup_tap").await;

    // A snapshot as the kitchen would publish it.
    let order = Order {
        order_id: "dup-ready-1".into(),
        restaurant_id: "rest-2".into(),
        restaurant_name: "Pizza Palace".into(),
        customer_id: "cust-9".into(),
        customer_name: "Jasur".into(),
        phone_number: "+998907654321".into(),
        items: vec![tez_delivery::model::LineItem::new("Margherita", 1, 60_000)],
        delivery_address: tez_delivery::model::DeliveryAddress::new("Mustaqillik 5"),
        status: OrderStatus::Ready,
        preparation_time: 20,
        estimated_delivery_time: Utc::now(),
        total_amount: 60_000,
        created_at: Utc::now(),
        confirmed_at: None,
        preparing_started_at: None,
        ready_at: Some(Utc::now()),
        picked_up_at: None,
        on_the_way_at: None,
        delivered_at: None,
        cancelled_at: None,
        driver: None,
    };

    system.bus.publish(RoutingKey::OrderReady, &order).await.expect("publish");
    system.bus.publish(RoutingKey::OrderReady, &order).await.expect("redeliver");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let busy: Vec<_> = system
        .delivery
        .driver_status()
        .await
        .expect("driver status")
        .into_iter()
        .filter(|d| !d.available)
        .collect();
    assert_eq!(busy.len(), 1, "one allocation despite the duplicate");
    assert_eq!(busy[0].current_order.as_deref(), Some("dup-ready-1"));

    let keys = events_during(&mut tap, "dup-ready-1", Duration::from_millis(700)).await;
    let pickups = keys.iter().filter(|k| **k == RoutingKey::OrderPickedUp).count();
    let deliveries = keys.iter().filter(|k| **k == RoutingKey::OrderDelivered).count();
    assert_eq!(pickups, 1);
    assert_eq!(deliveries, 1);

    drop(tap);
    system.shutdown().await.expect("shutdown");
}
