//! Demo run: place two orders, cancel one mid-preparation, and watch the
//! choreography play out on the bus.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, Instrument};

use tez_delivery::bus::RoutingKey;
use tez_delivery::config::SimulationConfig;
use tez_delivery::lifecycle::{setup_tracing, DeliverySystem};
use tez_delivery::model::LineItem;
use tez_delivery::notifications::Channel;
use tez_delivery::origination::CreateOrderRequest;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    // Compressed clock so a full order runs in a few seconds.
    let config = SimulationConfig {
        minute: Duration::from_millis(150),
        pickup_delay: Duration::from_millis(500),
        channel_latency: Duration::from_millis(50),
        ..SimulationConfig::default()
    };
    let system = DeliverySystem::start(config).await?;

    // Observe every order event the services publish.
    let mut events = system.bus.declare_queue("demo_observer", 64).await?;
    for key in RoutingKey::ALL {
        system.bus.bind("demo_observer", key).await?;
    }

    for restaurant in system.orders.list_restaurants().await? {
        info!(id = %restaurant.id, name = %restaurant.name, "Restaurant available");
    }

    let first = async {
        system
            .orders
            .create_order(CreateOrderRequest {
                restaurant_id: "rest-1".into(),
                customer_id: "cust-1".into(),
                customer_name: "Aziza Yusupova".into(),
                items: vec![
                    LineItem::new("Osh", 2, 25_000),
                    LineItem::new("Somsa", 3, 5_000),
                ],
                delivery_address: "Amir Temur ko'chasi 1".into(),
                phone_number: "+998901112233".into(),
            })
            .await
    }
    .instrument(tracing::info_span!("first_order"))
    .await?;
    info!(order_id = %first.order_id, total = first.total_amount, "First order placed");

    let second = system
        .orders
        .create_order(CreateOrderRequest {
            restaurant_id: "rest-2".into(),
            customer_id: "cust-2".into(),
            customer_name: "Jasur Komilov".into(),
            items: vec![LineItem::new("Margherita", 1, 60_000)],
            delivery_address: "Mustaqillik maydoni 5".into(),
            phone_number: "+998907654321".into(),
        })
        .await?;
    info!(order_id = %second.order_id, "Second order placed");

    // Let the kitchen get going, then cancel the second order mid-flight.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let cancelled = system.orders.cancel_order(&second.order_id).await?;
    info!(order_id = %cancelled.order_id, "Second order cancelled");

    // Drain events until the first order is delivered.
    let deadline = Duration::from_secs(30);
    timeout(deadline, async {
        while let Some(event) = events.recv().await {
            let order = event.order()?;
            info!(routing_key = %event.routing_key, order_id = %order.order_id, "Event");
            if event.routing_key == RoutingKey::OrderDelivered && order.order_id == first.order_id
            {
                return Ok::<_, Box<dyn std::error::Error>>(());
            }
        }
        Err("event stream ended early".into())
    })
    .await??;

    let history = system.notifications.history().await?;
    let count = |channel| history.iter().filter(|r| r.channel == channel).count();
    info!(
        total = history.len(),
        sms = count(Channel::Sms),
        email = count(Channel::Email),
        push = count(Channel::Push),
        "Notification statistics"
    );

    for driver in system.delivery.driver_status().await? {
        info!(
            driver_id = %driver.id,
            name = %driver.profile.name,
            available = driver.available,
            "Driver status"
        );
    }

    // The observer holds a bus handle; release it so the exchange can stop.
    drop(events);
    system.shutdown().await?;
    info!("Demo finished");
    Ok(())
}
