//! Kitchen workflow.
//!
//! Consumes `order.created` and `order.cancelled`. A new order is confirmed,
//! moved to PREPARING, and handed to a timed preparation task. The task never
//! touches kitchen state: it sleeps through the quarters of the scaled
//! preparation time and messages progress back to the actor, which is the
//! only place the active set is read or written. `order.ready` is emitted
//! only if the order is still in the active set when the completion message
//! arrives, so a cancellation that raced the simulation suppresses the
//! emission with no window in between.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusClient, BusError, Delivery, QueueReceiver, RoutingKey};
use crate::config::SimulationConfig;
use crate::model::{Order, OrderStatus};

const PROGRESS_CHECKPOINTS: [u32; 3] = [25, 50, 75];

enum PrepUpdate {
    Checkpoint { order_id: String, percent: u32 },
    Finished { order_id: String },
}

struct ActivePrep {
    order: Order,
    handle: JoinHandle<()>,
}

/// The kitchen service actor.
pub struct KitchenService {
    queue: QueueReceiver,
    bus: BusClient,
    config: SimulationConfig,
    sim_tx: mpsc::Sender<PrepUpdate>,
    sim_rx: mpsc::Receiver<PrepUpdate>,
    /// Orders currently being prepared, keyed by order id.
    active: HashMap<String, ActivePrep>,
    /// Tombstones: ids that finished or were cancelled. Guards against
    /// duplicate `order.created` deliveries.
    done: HashSet<String>,
    /// Yields `None` when the system drops its shutdown handle.
    shutdown_rx: mpsc::Receiver<()>,
}

impl KitchenService {
    pub fn new(
        queue: QueueReceiver,
        bus: BusClient,
        config: SimulationConfig,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        let (sim_tx, sim_rx) = mpsc::channel(64);
        Self {
            queue,
            bus,
            config,
            sim_tx,
            sim_rx,
            active: HashMap::new(),
            done: HashSet::new(),
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Kitchen service started");
        loop {
            tokio::select! {
                maybe_delivery = self.queue.recv() => {
                    let Some(delivery) = maybe_delivery else { break };
                    self.handle_delivery(delivery).await;
                }
                Some(update) = self.sim_rx.recv() => {
                    self.handle_update(update).await;
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }
        for (order_id, prep) in self.active.drain() {
            debug!(%order_id, "Aborting preparation on shutdown");
            prep.handle.abort();
        }
        info!("Kitchen service stopped");
    }

    async fn handle_delivery(&mut self, delivery: Delivery) {
        let order = match delivery.order() {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Malformed kitchen message");
                self.queue.nack(delivery).await;
                return;
            }
        };
        let result = match delivery.routing_key {
            RoutingKey::OrderCreated => self.on_created(order).await,
            RoutingKey::OrderCancelled => {
                self.on_cancelled(&order.order_id);
                Ok(())
            }
            other => {
                debug!(routing_key = %other, "Ignoring unexpected kitchen message");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Kitchen handler failed, requeueing");
            self.queue.nack(delivery).await;
        }
    }

    async fn on_created(&mut self, mut order: Order) -> Result<(), BusError> {
        let order_id = order.order_id.clone();
        if self.active.contains_key(&order_id) || self.done.contains(&order_id) {
            debug!(%order_id, "Duplicate order.created ignored");
            return Ok(());
        }
        if let Err(e) = order.advance(OrderStatus::Confirmed) {
            warn!(%order_id, error = %e, "Rejecting order snapshot");
            return Ok(());
        }
        self.bus.publish(RoutingKey::OrderConfirmed, &order).await?;
        info!(%order_id, restaurant = %order.restaurant_name, "Order confirmed");

        if let Err(e) = order.advance(OrderStatus::Preparing) {
            warn!(%order_id, error = %e, "Rejecting order snapshot");
            return Ok(());
        }
        self.bus.publish(RoutingKey::OrderPreparing, &order).await?;

        let handle = tokio::spawn(simulate_preparation(
            order_id.clone(),
            self.config.scaled_minutes(order.preparation_time),
            self.sim_tx.clone(),
        ));
        info!(
            %order_id,
            preparation_minutes = order.preparation_time,
            "Preparation started"
        );
        self.active.insert(order_id, ActivePrep { order, handle });
        Ok(())
    }

    fn on_cancelled(&mut self, order_id: &str) {
        self.done.insert(order_id.to_string());
        if let Some(prep) = self.active.remove(order_id) {
            prep.handle.abort();
            info!(%order_id, "Preparation stopped by cancellation");
        } else {
            debug!(%order_id, "Cancellation for order not in the kitchen");
        }
    }

    async fn handle_update(&mut self, update: PrepUpdate) {
        match update {
            PrepUpdate::Checkpoint { order_id, percent } => {
                if self.active.contains_key(&order_id) {
                    info!(%order_id, percent, "Preparation progress");
                }
            }
            PrepUpdate::Finished { order_id } => {
                // Tombstone check: a cancellation that won the race removed
                // the entry, and the READY emission must be suppressed.
                let Some(mut prep) = self.active.remove(&order_id) else {
                    info!(%order_id, "Preparation finished after cancellation, ready suppressed");
                    return;
                };
                if let Err(e) = prep.order.advance(OrderStatus::Ready) {
                    warn!(%order_id, error = %e, "Could not mark order ready");
                    return;
                }
                if let Err(e) = self.bus.publish(RoutingKey::OrderReady, &prep.order).await {
                    error!(%order_id, error = %e, "Failed to publish order.ready");
                }
                self.done.insert(order_id.clone());
                info!(%order_id, "Order ready");
            }
        }
    }
}

/// Sleeps through the preparation in quarters, reporting the 25/50/75%
/// checkpoints, then completion. Pure timer: all state lives in the actor.
async fn simulate_preparation(
    order_id: String,
    total: std::time::Duration,
    updates: mpsc::Sender<PrepUpdate>,
) {
    let quarter = total / 4;
    for percent in PROGRESS_CHECKPOINTS {
        tokio::time::sleep(quarter).await;
        if updates
            .send(PrepUpdate::Checkpoint {
                order_id: order_id.clone(),
                percent,
            })
            .await
            .is_err()
        {
            return;
        }
    }
    tokio::time::sleep(quarter).await;
    let _ = updates.send(PrepUpdate::Finished { order_id }).await;
}
