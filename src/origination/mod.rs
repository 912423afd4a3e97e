//! Order origination: the order desk service.
//!
//! The order desk owns the authoritative order record queried by clients and
//! the restaurant registry. It validates creation requests, computes the
//! immutable total and the delivery estimate, publishes `order.created`, and
//! offers the client-facing cancellation that is restricted to
//! PENDING/CONFIRMED (unlike the bus broadcast, which every consumer honors
//! at whatever status it locally sees).
//!
//! Per the queue layout, the order desk consumes nothing from the bus: its
//! record reflects creation and client-side cancellation only.

pub mod error;

pub use error::OrderError;

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{BusClient, RoutingKey};
use crate::clients::OrderDeskClient;
use crate::config::SimulationConfig;
use crate::model::{DeliveryAddress, LineItem, Order, OrderStatus, Restaurant};

/// Payload for creating a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub restaurant_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<LineItem>,
    pub delivery_address: String,
    pub phone_number: String,
}

pub(crate) type Response<T> = oneshot::Sender<Result<T, OrderError>>;

pub(crate) enum OrderDeskRequest {
    Create {
        request: CreateOrderRequest,
        respond_to: Response<Order>,
    },
    Cancel {
        order_id: String,
        respond_to: Response<Order>,
    },
    Get {
        order_id: String,
        respond_to: Response<Order>,
    },
    List {
        respond_to: oneshot::Sender<Vec<Order>>,
    },
    Restaurants {
        respond_to: oneshot::Sender<Vec<Restaurant>>,
    },
}

/// The order desk actor. Owns the order map exclusively; every mutation
/// happens inside its message loop, so check-then-mutate is atomic.
pub struct OrderDesk {
    receiver: mpsc::Receiver<OrderDeskRequest>,
    bus: BusClient,
    config: SimulationConfig,
    restaurants: HashMap<String, Restaurant>,
    orders: HashMap<String, Order>,
}

/// Creates the order desk and its client.
pub fn new(
    bus: BusClient,
    restaurants: Vec<Restaurant>,
    config: SimulationConfig,
) -> (OrderDesk, OrderDeskClient) {
    let (sender, receiver) = mpsc::channel(32);
    let desk = OrderDesk {
        receiver,
        bus,
        config,
        restaurants: restaurants.into_iter().map(|r| (r.id.clone(), r)).collect(),
        orders: HashMap::new(),
    };
    (desk, OrderDeskClient::new(sender))
}

impl OrderDesk {
    pub async fn run(mut self) {
        info!(restaurants = self.restaurants.len(), "Order desk started");
        while let Some(request) = self.receiver.recv().await {
            match request {
                OrderDeskRequest::Create {
                    request,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.create(request).await);
                }
                OrderDeskRequest::Cancel {
                    order_id,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.cancel(&order_id).await);
                }
                OrderDeskRequest::Get {
                    order_id,
                    respond_to,
                } => {
                    let result = self
                        .orders
                        .get(&order_id)
                        .cloned()
                        .ok_or(OrderError::OrderNotFound(order_id));
                    let _ = respond_to.send(result);
                }
                OrderDeskRequest::List { respond_to } => {
                    let _ = respond_to.send(self.orders.values().cloned().collect());
                }
                OrderDeskRequest::Restaurants { respond_to } => {
                    let _ = respond_to.send(self.restaurants.values().cloned().collect());
                }
            }
        }
        info!(orders = self.orders.len(), "Order desk stopped");
    }

    async fn create(&mut self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        debug!(?request, "create called");
        validate(&request)?;
        let restaurant = self
            .restaurants
            .get(&request.restaurant_id)
            .ok_or_else(|| OrderError::RestaurantNotFound(request.restaurant_id.clone()))?;

        let delivery_minutes = rand::thread_rng().gen_range(self.config.delivery_minutes.clone());
        let total_minutes = restaurant.average_preparation_time + delivery_minutes;
        let now = chrono::Utc::now();

        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            restaurant_id: restaurant.id.clone(),
            restaurant_name: restaurant.name.clone(),
            customer_id: request.customer_id,
            customer_name: request.customer_name,
            phone_number: request.phone_number,
            total_amount: Order::compute_total(&request.items),
            items: request.items,
            delivery_address: DeliveryAddress::new(request.delivery_address),
            status: OrderStatus::Pending,
            preparation_time: restaurant.average_preparation_time,
            estimated_delivery_time: now + chrono::Duration::minutes(i64::from(total_minutes)),
            created_at: now,
            confirmed_at: None,
            preparing_started_at: None,
            ready_at: None,
            picked_up_at: None,
            on_the_way_at: None,
            delivered_at: None,
            cancelled_at: None,
            driver: None,
        };

        self.orders.insert(order.order_id.clone(), order.clone());
        self.bus.publish(RoutingKey::OrderCreated, &order).await?;
        info!(
            order_id = %order.order_id,
            restaurant = %order.restaurant_name,
            total = order.total_amount,
            "Order created"
        );
        Ok(order)
    }

    async fn cancel(&mut self, order_id: &str) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        if !order.status.is_cancellable() {
            warn!(%order_id, status = %order.status, "Cancellation refused");
            return Err(OrderError::NotCancellable(order.status));
        }
        order
            .advance(OrderStatus::Cancelled)
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        let snapshot = order.clone();
        self.bus.publish(RoutingKey::OrderCancelled, &snapshot).await?;
        info!(%order_id, "Order cancelled");
        Ok(snapshot)
    }
}

fn validate(request: &CreateOrderRequest) -> Result<(), OrderError> {
    if request.restaurant_id.is_empty() {
        return Err(OrderError::Validation("restaurant id is required".into()));
    }
    if request.customer_id.is_empty() {
        return Err(OrderError::Validation("customer id is required".into()));
    }
    if request.delivery_address.is_empty() {
        return Err(OrderError::Validation("delivery address is required".into()));
    }
    if request.items.is_empty() {
        return Err(OrderError::Validation("at least one item is required".into()));
    }
    if request.items.iter().any(|item| item.quantity == 0) {
        return Err(OrderError::Validation("item quantity must be positive".into()));
    }
    Ok(())
}
