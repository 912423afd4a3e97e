//! Delivery workflow and driver allocation.
//!
//! Consumes `order.ready` and `order.cancelled`. A ready order claims the
//! first available driver (an atomic reservation: the pool is owned by this
//! actor and the scan-and-mark happens with no await point in between),
//! emits `order.picked_up`, and hands the order to a timed transit task. As
//! in the kitchen, the task only sleeps and messages progress back; every
//! mutation of the pool and the active-delivery set happens in the actor.
//!
//! A ready order with no free driver is never dropped: it is requeued with
//! backoff a bounded number of times and then parked in an explicit
//! unassigned backlog that stays queryable. Cancellation aborts the transit
//! task outright and releases the driver immediately; the driver is also
//! released on every completion or failure path, so no failure can leave a
//! driver permanently busy.

pub mod pool;

pub use pool::DriverPool;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusClient, Delivery, QueueReceiver, RoutingKey};
use crate::clients::DeliveryClient;
use crate::config::SimulationConfig;
use crate::model::{Driver, Order, OrderStatus};

const LEG_LABELS: [&str; 5] = [
    "left the restaurant",
    "passing the city center",
    "approaching the district",
    "five minutes away",
    "arrived at the address",
];

enum TransitUpdate {
    Departed { order_id: String },
    Leg { order_id: String, leg: u32 },
    Arrived { order_id: String },
}

pub(crate) enum DeliveryQuery {
    Drivers {
        respond_to: oneshot::Sender<Vec<Driver>>,
    },
    Unassigned {
        respond_to: oneshot::Sender<Vec<Order>>,
    },
}

/// An in-progress delivery: ephemeral, removed on completion, failure or
/// cancellation.
struct ActiveDelivery {
    order: Order,
    driver_id: String,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// The delivery service actor.
pub struct DeliveryService {
    queue: QueueReceiver,
    bus: BusClient,
    config: SimulationConfig,
    pool: DriverPool,
    sim_tx: mpsc::Sender<TransitUpdate>,
    sim_rx: mpsc::Receiver<TransitUpdate>,
    query_rx: mpsc::Receiver<DeliveryQuery>,
    /// Active deliveries keyed by order id.
    active: HashMap<String, ActiveDelivery>,
    /// Tombstones: delivered or cancelled ids, guarding duplicate
    /// `order.ready` deliveries against a second allocation.
    done: HashSet<String>,
    /// Orders that exhausted their allocation retries.
    unassigned: Vec<Order>,
    /// Yields `None` when the system drops its shutdown handle.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Creates the delivery service and its client.
pub fn new(
    queue: QueueReceiver,
    bus: BusClient,
    drivers: Vec<Driver>,
    config: SimulationConfig,
    shutdown_rx: mpsc::Receiver<()>,
) -> (DeliveryService, DeliveryClient) {
    let (query_tx, query_rx) = mpsc::channel(16);
    let (sim_tx, sim_rx) = mpsc::channel(64);
    let service = DeliveryService {
        queue,
        bus,
        config,
        pool: DriverPool::new(drivers),
        sim_tx,
        sim_rx,
        query_rx,
        active: HashMap::new(),
        done: HashSet::new(),
        unassigned: Vec::new(),
        shutdown_rx,
    };
    (service, DeliveryClient::new(query_tx))
}

impl DeliveryService {
    pub async fn run(mut self) {
        info!(drivers = self.pool.drivers().len(), "Delivery service started");
        let mut queries_open = true;
        loop {
            tokio::select! {
                maybe_delivery = self.queue.recv() => {
                    let Some(delivery) = maybe_delivery else { break };
                    self.handle_delivery(delivery).await;
                }
                Some(update) = self.sim_rx.recv() => {
                    self.handle_update(update).await;
                }
                maybe_query = self.query_rx.recv(), if queries_open => {
                    match maybe_query {
                        Some(query) => self.handle_query(query),
                        None => queries_open = false,
                    }
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }
        for (order_id, delivery) in self.active.drain() {
            debug!(%order_id, "Aborting transit on shutdown");
            delivery.handle.abort();
        }
        info!("Delivery service stopped");
    }

    async fn handle_delivery(&mut self, delivery: Delivery) {
        let order = match delivery.order() {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Malformed delivery message");
                self.queue.nack(delivery).await;
                return;
            }
        };
        match delivery.routing_key {
            RoutingKey::OrderReady => self.on_ready(order, delivery).await,
            RoutingKey::OrderCancelled => self.on_cancelled(&order.order_id),
            other => debug!(routing_key = %other, "Ignoring unexpected delivery message"),
        }
    }

    async fn on_ready(&mut self, mut order: Order, delivery: Delivery) {
        let order_id = order.order_id.clone();
        if self.active.contains_key(&order_id) || self.done.contains(&order_id) {
            debug!(%order_id, "Duplicate order.ready ignored");
            return;
        }

        // Scan-and-claim with no await in between: the reservation is atomic.
        let Some(driver) = self.pool.reserve(&order_id) else {
            if delivery.attempt <= self.config.allocation_retries {
                warn!(
                    %order_id,
                    attempt = delivery.attempt,
                    "No driver available, requeueing"
                );
                self.queue.nack(delivery).await;
            } else {
                error!(
                    %order_id,
                    attempts = delivery.attempt,
                    "No driver available after retries, order parked unassigned"
                );
                self.unassigned.push(order);
            }
            return;
        };

        let driver_id = driver.id.clone();
        order.driver = Some(driver);
        if let Err(e) = order.advance(OrderStatus::PickedUp) {
            warn!(%order_id, error = %e, "Rejecting ready snapshot");
            self.pool.release(&driver_id);
            return;
        }
        if let Err(e) = self.bus.publish(RoutingKey::OrderPickedUp, &order).await {
            warn!(%order_id, error = %e, "Failed to publish order.picked_up, requeueing");
            self.pool.release(&driver_id);
            self.queue.nack(delivery).await;
            return;
        }

        let transit_minutes = rand::thread_rng().gen_range(self.config.delivery_minutes.clone());
        let handle = tokio::spawn(simulate_transit(
            order_id.clone(),
            self.config.pickup_delay,
            self.config.scaled_minutes(transit_minutes),
            self.config.transit_legs,
            self.sim_tx.clone(),
        ));
        info!(
            %order_id,
            %driver_id,
            transit_minutes,
            "Order picked up"
        );
        self.active.insert(
            order_id,
            ActiveDelivery {
                order,
                driver_id,
                started_at: Utc::now(),
                handle,
            },
        );
    }

    fn on_cancelled(&mut self, order_id: &str) {
        self.done.insert(order_id.to_string());
        if let Some(active) = self.active.remove(order_id) {
            active.handle.abort();
            self.pool.release(&active.driver_id);
            info!(%order_id, driver_id = %active.driver_id, "Delivery stopped by cancellation, driver released");
        } else {
            debug!(%order_id, "Cancellation for order not in delivery");
        }
    }

    async fn handle_update(&mut self, update: TransitUpdate) {
        match update {
            TransitUpdate::Departed { order_id } => {
                if let Some(active) = self.active.get_mut(&order_id) {
                    if let Err(e) = active.order.advance(OrderStatus::OnTheWay) {
                        warn!(%order_id, error = %e, "Could not mark order on the way");
                        return;
                    }
                    info!(
                        %order_id,
                        destination = %active.order.delivery_address.address,
                        "On the way"
                    );
                }
            }
            TransitUpdate::Leg { order_id, leg } => {
                if self.active.contains_key(&order_id) {
                    let label = LEG_LABELS
                        .get(leg.saturating_sub(1) as usize)
                        .copied()
                        .unwrap_or("en route");
                    info!(%order_id, leg, "Transit: {label}");
                }
            }
            TransitUpdate::Arrived { order_id } => {
                // Cancellation may have raced the arrival; the assignment is
                // the tombstone.
                let Some(mut active) = self.active.remove(&order_id) else {
                    info!(%order_id, "Transit finished after cancellation, delivery suppressed");
                    return;
                };
                // Release before anything that can fail: a driver must never
                // stay busy because a publish did not go through.
                self.pool.release(&active.driver_id);
                self.done.insert(order_id.clone());
                if let Err(e) = active.order.advance(OrderStatus::Delivered) {
                    warn!(%order_id, error = %e, "Could not mark order delivered");
                    return;
                }
                if let Err(e) = self.bus.publish(RoutingKey::OrderDelivered, &active.order).await {
                    error!(%order_id, error = %e, "Failed to publish order.delivered");
                }
                info!(%order_id, driver_id = %active.driver_id, "Order delivered, driver released");
            }
        }
    }

    fn handle_query(&self, query: DeliveryQuery) {
        match query {
            DeliveryQuery::Drivers { respond_to } => {
                let _ = respond_to.send(self.pool.drivers());
            }
            DeliveryQuery::Unassigned { respond_to } => {
                let _ = respond_to.send(self.unassigned.clone());
            }
        }
    }
}

/// Pickup delay, then the drawn transit duration split into equal legs.
/// Pure timer: all state lives in the actor.
async fn simulate_transit(
    order_id: String,
    pickup_delay: Duration,
    total: Duration,
    legs: u32,
    updates: mpsc::Sender<TransitUpdate>,
) {
    tokio::time::sleep(pickup_delay).await;
    if updates
        .send(TransitUpdate::Departed {
            order_id: order_id.clone(),
        })
        .await
        .is_err()
    {
        return;
    }
    let leg_duration = total / legs.max(1);
    for leg in 1..=legs.max(1) {
        tokio::time::sleep(leg_duration).await;
        if updates
            .send(TransitUpdate::Leg {
                order_id: order_id.clone(),
                leg,
            })
            .await
            .is_err()
        {
            return;
        }
    }
    let _ = updates.send(TransitUpdate::Arrived { order_id }).await;
}
