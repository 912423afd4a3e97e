//! In-process durable topic exchange.
//!
//! The exchange is a message-loop actor owning every queue and binding, so
//! routing decisions never race: publish, bind and redelivery are all handled
//! sequentially by one task. Bindings are exact matches on dot-separated
//! routing keys; several queues bound to the same key each receive an
//! independent copy of the message (fan-out).
//!
//! Delivery is at-least-once with ack-on-success semantics: a consumer that
//! processes a [`Delivery`] successfully simply moves on, while a failed
//! handler calls [`QueueReceiver::nack`]. The exchange redelivers nacked
//! messages with a linear backoff up to a bounded attempt count, then parks
//! them in a dead-letter store that stays queryable for diagnosis. Consumers
//! must therefore tolerate duplicate delivery (idempotence by order id).

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::model::Order;

/// Routing keys of the `orders` topic exchange, one per order transition.
///
/// `ON_THE_WAY` has no key: it is a local transition inside the delivery
/// workflow and is never published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingKey {
    OrderCreated,
    OrderConfirmed,
    OrderPreparing,
    OrderReady,
    OrderPickedUp,
    OrderDelivered,
    OrderCancelled,
}

impl RoutingKey {
    pub const ALL: [RoutingKey; 7] = [
        RoutingKey::OrderCreated,
        RoutingKey::OrderConfirmed,
        RoutingKey::OrderPreparing,
        RoutingKey::OrderReady,
        RoutingKey::OrderPickedUp,
        RoutingKey::OrderDelivered,
        RoutingKey::OrderCancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoutingKey::OrderCreated => "order.created",
            RoutingKey::OrderConfirmed => "order.confirmed",
            RoutingKey::OrderPreparing => "order.preparing",
            RoutingKey::OrderReady => "order.ready",
            RoutingKey::OrderPickedUp => "order.picked_up",
            RoutingKey::OrderDelivered => "order.delivered",
            RoutingKey::OrderCancelled => "order.cancelled",
        }
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by bus operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BusError {
    /// The exchange task is gone; nothing can be published or bound anymore.
    #[error("bus closed")]
    Closed,
    /// A payload failed to serialize or deserialize.
    #[error("payload codec error: {0}")]
    Codec(String),
    #[error("queue already declared: {0}")]
    QueueExists(String),
    #[error("unknown queue: {0}")]
    UnknownQueue(String),
}

/// One message handed to a consumer.
///
/// `attempt` starts at 1 and grows with every redelivery, letting consumers
/// apply their own bounded-retry policies on top of the bus's.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: RoutingKey,
    pub payload: String,
    pub attempt: u32,
}

impl Delivery {
    /// Deserializes the order snapshot carried by this message.
    pub fn order(&self) -> Result<Order, BusError> {
        serde_json::from_str(&self.payload).map_err(|e| BusError::Codec(e.to_string()))
    }
}

/// A message that exhausted its redeliveries.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub queue: String,
    pub delivery: Delivery,
}

enum BusCommand {
    Publish {
        routing_key: RoutingKey,
        payload: String,
    },
    DeclareQueue {
        name: String,
        capacity: usize,
        respond_to: oneshot::Sender<Result<mpsc::Receiver<Delivery>, BusError>>,
    },
    Bind {
        queue: String,
        routing_key: RoutingKey,
        respond_to: oneshot::Sender<Result<(), BusError>>,
    },
    Nack {
        queue: String,
        delivery: Delivery,
    },
    DeadLetters {
        respond_to: oneshot::Sender<Vec<DeadLetter>>,
    },
}

/// The exchange actor. Create with [`TopicExchange::new`], then spawn
/// [`TopicExchange::run`] and talk to it through the returned [`BusClient`].
pub struct TopicExchange {
    receiver: mpsc::Receiver<BusCommand>,
    queues: HashMap<String, mpsc::Sender<Delivery>>,
    bindings: HashMap<RoutingKey, Vec<String>>,
    max_redeliveries: u32,
    redelivery_backoff: Duration,
    dead_letters: Vec<DeadLetter>,
}

impl TopicExchange {
    pub fn new(max_redeliveries: u32, redelivery_backoff: Duration) -> (Self, BusClient) {
        let (sender, receiver) = mpsc::channel(64);
        let exchange = Self {
            receiver,
            queues: HashMap::new(),
            bindings: HashMap::new(),
            max_redeliveries,
            redelivery_backoff,
            dead_letters: Vec::new(),
        };
        (exchange, BusClient { sender })
    }

    /// Routes commands until every client is dropped.
    pub async fn run(mut self) {
        info!("Topic exchange started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                BusCommand::Publish {
                    routing_key,
                    payload,
                } => self.publish(routing_key, payload),
                BusCommand::DeclareQueue {
                    name,
                    capacity,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.declare_queue(name, capacity));
                }
                BusCommand::Bind {
                    queue,
                    routing_key,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.bind(queue, routing_key));
                }
                BusCommand::Nack { queue, delivery } => self.redeliver(queue, delivery),
                BusCommand::DeadLetters { respond_to } => {
                    let _ = respond_to.send(self.dead_letters.clone());
                }
            }
        }
        info!(dead_letters = self.dead_letters.len(), "Topic exchange stopped");
    }

    fn publish(&self, routing_key: RoutingKey, payload: String) {
        let Some(queues) = self.bindings.get(&routing_key) else {
            debug!(%routing_key, "No queue bound, message dropped");
            return;
        };
        for name in queues {
            let delivery = Delivery {
                routing_key,
                payload: payload.clone(),
                attempt: 1,
            };
            if let Some(sender) = self.queues.get(name) {
                Self::enqueue(name, sender.clone(), delivery);
            }
        }
    }

    /// Hands a delivery to a queue without ever blocking the routing loop.
    /// A full queue falls back to an async send on a spawned task, so the
    /// message is retained until the consumer drains its backlog.
    fn enqueue(name: &str, sender: mpsc::Sender<Delivery>, delivery: Delivery) {
        if let Err(mpsc::error::TrySendError::Full(delivery)) = sender.try_send(delivery) {
            warn!(queue = name, "Queue full, deferring enqueue");
            tokio::spawn(async move {
                let _ = sender.send(delivery).await;
            });
        }
    }

    fn declare_queue(
        &mut self,
        name: String,
        capacity: usize,
    ) -> Result<mpsc::Receiver<Delivery>, BusError> {
        if self.queues.contains_key(&name) {
            return Err(BusError::QueueExists(name));
        }
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        info!(queue = %name, "Queue declared");
        self.queues.insert(name, sender);
        Ok(receiver)
    }

    fn bind(&mut self, queue: String, routing_key: RoutingKey) -> Result<(), BusError> {
        if !self.queues.contains_key(&queue) {
            return Err(BusError::UnknownQueue(queue));
        }
        let bound = self.bindings.entry(routing_key).or_default();
        if !bound.contains(&queue) {
            debug!(queue = %queue, %routing_key, "Queue bound");
            bound.push(queue);
        }
        Ok(())
    }

    fn redeliver(&mut self, queue: String, mut delivery: Delivery) {
        delivery.attempt += 1;
        if delivery.attempt > self.max_redeliveries + 1 {
            error!(
                queue = %queue,
                routing_key = %delivery.routing_key,
                attempts = delivery.attempt - 1,
                "Redeliveries exhausted, dead-lettering"
            );
            self.dead_letters.push(DeadLetter { queue, delivery });
            return;
        }
        let Some(sender) = self.queues.get(&queue).cloned() else {
            self.dead_letters.push(DeadLetter { queue, delivery });
            return;
        };
        let backoff = self.redelivery_backoff * (delivery.attempt - 1);
        warn!(
            queue = %queue,
            routing_key = %delivery.routing_key,
            attempt = delivery.attempt,
            "Redelivering after backoff"
        );
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = sender.send(delivery).await;
        });
    }
}

/// Cloneable handle to the exchange. Publishing is fire-and-forget from the
/// caller's perspective; the exchange keeps the message until every bound
/// queue has taken its copy.
#[derive(Clone)]
pub struct BusClient {
    sender: mpsc::Sender<BusCommand>,
}

impl BusClient {
    /// Serializes the order snapshot and routes it by `routing_key`.
    pub async fn publish(&self, routing_key: RoutingKey, order: &Order) -> Result<(), BusError> {
        let payload = to_payload(order)?;
        self.sender
            .send(BusCommand::Publish {
                routing_key,
                payload,
            })
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Declares a durable queue and returns its consumer end.
    pub async fn declare_queue(
        &self,
        name: impl Into<String>,
        capacity: usize,
    ) -> Result<QueueReceiver, BusError> {
        let name = name.into();
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BusCommand::DeclareQueue {
                name: name.clone(),
                capacity,
                respond_to,
            })
            .await
            .map_err(|_| BusError::Closed)?;
        let receiver = response.await.map_err(|_| BusError::Closed)??;
        Ok(QueueReceiver {
            name,
            receiver,
            bus: self.clone(),
        })
    }

    /// Binds a declared queue to a routing key (exact match).
    pub async fn bind(&self, queue: impl Into<String>, routing_key: RoutingKey) -> Result<(), BusError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BusCommand::Bind {
                queue: queue.into(),
                routing_key,
                respond_to,
            })
            .await
            .map_err(|_| BusError::Closed)?;
        response.await.map_err(|_| BusError::Closed)?
    }

    /// Messages that exhausted their redeliveries, for diagnosis.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, BusError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(BusCommand::DeadLetters { respond_to })
            .await
            .map_err(|_| BusError::Closed)?;
        response.await.map_err(|_| BusError::Closed)
    }

    async fn nack(&self, queue: String, delivery: Delivery) {
        let _ = self.sender.send(BusCommand::Nack { queue, delivery }).await;
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<String, BusError> {
    serde_json::to_string(value).map_err(|e| BusError::Codec(e.to_string()))
}

/// Consumer end of a declared queue.
pub struct QueueReceiver {
    name: String,
    receiver: mpsc::Receiver<Delivery>,
    bus: BusClient,
}

impl QueueReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next message, or `None` once the exchange is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Reports a failed handling attempt. The exchange redelivers with
    /// backoff until the attempt limit, then dead-letters the message.
    pub async fn nack(&self, delivery: Delivery) {
        self.bus.nack(self.name.clone(), delivery).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeliveryAddress, LineItem, OrderStatus};
    use chrono::Utc;

    fn sample_order(id: &str) -> Order {
        Order {
            order_id: id.into(),
            restaurant_id: "rest-1".into(),
            restaurant_name: "Osh Markazi".into(),
            customer_id: "cust-1".into(),
            customer_name: "Aziza".into(),
            phone_number: "+998901112233".into(),
            items: vec![LineItem::new("Osh", 1, 25_000)],
            delivery_address: DeliveryAddress::new("Amir Temur 1"),
            status: OrderStatus::Pending,
            preparation_time: 30,
            estimated_delivery_time: Utc::now(),
            total_amount: 25_000,
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

    #[tokio::test]
    async fn fan_out_delivers_an_independent_copy_per_queue() {
        let (exchange, bus) = TopicExchange::new(3, Duration::from_millis(1));
        tokio::spawn(exchange.run());

        let mut first = bus.declare_queue("first", 8).await.unwrap();
        let mut second = bus.declare_queue("second", 8).await.unwrap();
        bus.bind("first", RoutingKey::OrderCreated).await.unwrap();
        bus.bind("second", RoutingKey::OrderCreated).await.unwrap();

        bus.publish(RoutingKey::OrderCreated, &sample_order("o-1"))
            .await
            .unwrap();

        let a = first.recv().await.expect("first queue copy");
        let b = second.recv().await.expect("second queue copy");
        assert_eq!(a.order().unwrap().order_id, "o-1");
        assert_eq!(b.order().unwrap().order_id, "o-1");
        assert_eq!(a.attempt, 1);
    }

    #[tokio::test]
    async fn binding_is_exact_match_on_routing_key() {
        let (exchange, bus) = TopicExchange::new(3, Duration::from_millis(1));
        tokio::spawn(exchange.run());

        let mut queue = bus.declare_queue("kitchen", 8).await.unwrap();
        bus.bind("kitchen", RoutingKey::OrderCreated).await.unwrap();

        bus.publish(RoutingKey::OrderCancelled, &sample_order("o-2"))
            .await
            .unwrap();
        bus.publish(RoutingKey::OrderCreated, &sample_order("o-3"))
            .await
            .unwrap();

        let delivery = queue.recv().await.expect("bound key delivery");
        assert_eq!(delivery.routing_key, RoutingKey::OrderCreated);
        assert_eq!(delivery.order().unwrap().order_id, "o-3");
    }

    #[tokio::test]
    async fn nack_redelivers_then_dead_letters() {
        let (exchange, bus) = TopicExchange::new(2, Duration::from_millis(1));
        tokio::spawn(exchange.run());

        let mut queue = bus.declare_queue("delivery", 8).await.unwrap();
        bus.bind("delivery", RoutingKey::OrderReady).await.unwrap();
        bus.publish(RoutingKey::OrderReady, &sample_order("o-4"))
            .await
            .unwrap();

        // Reject every attempt: 1 original + 2 redeliveries, then dead letter.
        for expected_attempt in 1..=3 {
            let delivery = queue.recv().await.expect("redelivery");
            assert_eq!(delivery.attempt, expected_attempt);
            queue.nack(delivery).await;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let dead = bus.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].queue, "delivery");
        assert_eq!(dead[0].delivery.order().unwrap().order_id, "o-4");
    }

    #[tokio::test]
    async fn binding_an_unknown_queue_fails() {
        let (exchange, bus) = TopicExchange::new(3, Duration::from_millis(1));
        tokio::spawn(exchange.run());
        let err = bus.bind("ghost", RoutingKey::OrderCreated).await.unwrap_err();
        assert_eq!(err, BusError::UnknownQueue("ghost".into()));
    }
}
