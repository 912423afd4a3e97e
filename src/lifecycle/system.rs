//! The runtime orchestrator for the choreographed delivery system.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::bus::{BusClient, BusError, RoutingKey, TopicExchange};
use crate::clients::{DeliveryClient, NotificationClient, OrderDeskClient};
use crate::config::SimulationConfig;
use crate::model::{Driver, Restaurant};
use crate::notifications::SimulatedChannels;
use crate::{delivery, kitchen, notifications, origination};

/// Queue names on the `orders` exchange.
pub const KITCHEN_QUEUE: &str = "kitchen_orders_queue";
pub const DELIVERY_QUEUE: &str = "delivery_orders_queue";
pub const NOTIFICATIONS_QUEUE: &str = "notifications_queue";

/// Errors raised while starting or stopping the system.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Bus setup failed; the system cannot run without it.
    #[error("bus setup failed: {0}")]
    Bus(#[from] BusError),
    /// A service task panicked or failed to stop cleanly.
    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

/// All running services plus the client handles to talk to them.
///
/// `DeliverySystem` is responsible for:
/// - spawning the topic exchange and declaring the queue/binding layout,
/// - seeding restaurants and drivers,
/// - spawning one task per service,
/// - graceful shutdown (drop the clients, wait for the tasks).
pub struct DeliverySystem {
    /// Order origination: create, cancel and query orders.
    pub orders: OrderDeskClient,
    /// Delivery service queries: driver status and the unassigned backlog.
    pub delivery: DeliveryClient,
    /// Notification history queries.
    pub notifications: NotificationClient,
    /// Direct bus access, mainly for observers binding their own queues.
    pub bus: BusClient,
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown_handles: Vec<mpsc::Sender<()>>,
}

impl DeliverySystem {
    /// Starts the whole system with the sample restaurants and drivers.
    ///
    /// Bus setup failure is fatal and propagates out of here; nothing can
    /// run without the exchange.
    pub async fn start(config: SimulationConfig) -> Result<Self, SystemError> {
        let (exchange, bus) = TopicExchange::new(config.max_redeliveries, config.redelivery_backoff);
        let exchange_handle = tokio::spawn(exchange.run());

        let kitchen_queue = bus.declare_queue(KITCHEN_QUEUE, config.queue_capacity).await?;
        bus.bind(KITCHEN_QUEUE, RoutingKey::OrderCreated).await?;
        bus.bind(KITCHEN_QUEUE, RoutingKey::OrderCancelled).await?;

        let delivery_queue = bus.declare_queue(DELIVERY_QUEUE, config.queue_capacity).await?;
        bus.bind(DELIVERY_QUEUE, RoutingKey::OrderReady).await?;
        bus.bind(DELIVERY_QUEUE, RoutingKey::OrderCancelled).await?;

        let notifications_queue = bus
            .declare_queue(NOTIFICATIONS_QUEUE, config.queue_capacity)
            .await?;
        for key in RoutingKey::ALL {
            bus.bind(NOTIFICATIONS_QUEUE, key).await?;
        }

        let mut shutdown_handles = Vec::new();
        let mut shutdown_rx = || {
            let (tx, rx) = mpsc::channel(1);
            shutdown_handles.push(tx);
            rx
        };

        let (order_desk, orders) =
            origination::new(bus.clone(), Restaurant::samples(), config.clone());
        let kitchen =
            kitchen::KitchenService::new(kitchen_queue, bus.clone(), config.clone(), shutdown_rx());
        let (delivery_service, delivery) = delivery::new(
            delivery_queue,
            bus.clone(),
            Driver::samples(),
            config.clone(),
            shutdown_rx(),
        );
        let channels = Box::new(SimulatedChannels::new(config.channel_latency));
        let (notification_service, notifications) =
            notifications::new(notifications_queue, channels, shutdown_rx());

        let handles = vec![
            exchange_handle,
            tokio::spawn(order_desk.run()),
            tokio::spawn(kitchen.run()),
            tokio::spawn(delivery_service.run()),
            tokio::spawn(notification_service.run()),
        ];
        info!("Delivery system started");

        Ok(Self {
            orders,
            delivery,
            notifications,
            bus,
            handles,
            shutdown_handles,
        })
    }

    /// Gracefully shuts the system down.
    ///
    /// Dropping the clients and shutdown handles closes every service's
    /// channels; each service drains its loop, aborts outstanding simulation
    /// tasks and exits, after which the exchange stops on its own.
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down delivery system");
        drop(self.orders);
        drop(self.delivery);
        drop(self.notifications);
        drop(self.shutdown_handles);
        drop(self.bus);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Service task failed");
                return Err(SystemError::Shutdown(e.to_string()));
            }
        }
        info!("Delivery system shutdown complete");
        Ok(())
    }
}
