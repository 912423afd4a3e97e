//! Notification dispatch.
//!
//! Consumes every order event and projects it through [`dispatcher::plan`]
//! into channel sends. Sends run sequentially per event through the
//! [`ChannelSender`] seam; every send appends a receipt to an append-only
//! history used for diagnostics only, never for deduplication or replay.

pub mod dispatcher;

pub use dispatcher::{plan, Channel, Notification};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::bus::{Delivery, QueueReceiver};
use crate::clients::NotificationClient;
use crate::model::OrderStatus;

/// Record of one attempted send.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub order_id: String,
    pub status: OrderStatus,
    pub channel: Channel,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
}

/// Outbound channel integration. The simulated implementation just logs;
/// tests can substitute their own.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Delivers one notification, returning whether the send succeeded.
    async fn send(&self, notification: &Notification) -> bool;
}

/// Pretend SMS/email/push gateways: a fixed latency and a structured log
/// line per send.
pub struct SimulatedChannels {
    latency: Duration,
}

impl SimulatedChannels {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl ChannelSender for SimulatedChannels {
    async fn send(&self, notification: &Notification) -> bool {
        tokio::time::sleep(self.latency).await;
        info!(
            channel = %notification.channel,
            recipient = %notification.recipient,
            title = notification.title.as_deref().unwrap_or(""),
            body = %notification.body,
            "Notification sent"
        );
        true
    }
}

pub(crate) enum NotificationQuery {
    History {
        respond_to: oneshot::Sender<Vec<Receipt>>,
    },
}

/// The notification service actor.
pub struct NotificationService {
    queue: QueueReceiver,
    sender: Box<dyn ChannelSender>,
    query_rx: mpsc::Receiver<NotificationQuery>,
    history: Vec<Receipt>,
    /// Yields `None` when the system drops its shutdown handle.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Creates the notification service and its client.
pub fn new(
    queue: QueueReceiver,
    sender: Box<dyn ChannelSender>,
    shutdown_rx: mpsc::Receiver<()>,
) -> (NotificationService, NotificationClient) {
    let (query_tx, query_rx) = mpsc::channel(16);
    let service = NotificationService {
        queue,
        sender,
        query_rx,
        history: Vec::new(),
        shutdown_rx,
    };
    (service, NotificationClient::new(query_tx))
}

impl NotificationService {
    pub async fn run(mut self) {
        info!("Notification service started");
        let mut queries_open = true;
        loop {
            tokio::select! {
                maybe_delivery = self.queue.recv() => {
                    let Some(delivery) = maybe_delivery else { break };
                    self.handle_delivery(delivery).await;
                }
                maybe_query = self.query_rx.recv(), if queries_open => {
                    match maybe_query {
                        Some(NotificationQuery::History { respond_to }) => {
                            let _ = respond_to.send(self.history.clone());
                        }
                        None => queries_open = false,
                    }
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }
        info!(sent = self.history.len(), "Notification service stopped");
    }

    async fn handle_delivery(&mut self, delivery: Delivery) {
        let order = match delivery.order() {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Malformed notification message");
                self.queue.nack(delivery).await;
                return;
            }
        };
        debug!(
            order_id = %order.order_id,
            status = %order.status,
            routing_key = %delivery.routing_key,
            "Order event received"
        );
        for notification in plan(&order) {
            let success = self.sender.send(&notification).await;
            if !success {
                warn!(
                    order_id = %order.order_id,
                    channel = %notification.channel,
                    "Notification send failed"
                );
            }
            self.history.push(Receipt {
                order_id: order.order_id.clone(),
                status: order.status,
                channel: notification.channel,
                sent_at: Utc::now(),
                success,
            });
        }
    }
}
