//! Client for the order desk service.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::model::{Order, Restaurant};
use crate::origination::{CreateOrderRequest, OrderDeskRequest, OrderError};

/// Client-facing surface of order origination: create, cancel and read back
/// orders, plus the restaurant listing.
#[derive(Clone)]
pub struct OrderDeskClient {
    sender: mpsc::Sender<OrderDeskRequest>,
}

impl OrderDeskClient {
    pub(crate) fn new(sender: mpsc::Sender<OrderDeskRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self, request))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        debug!(?request, "create_order called");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(OrderDeskRequest::Create {
                request,
                respond_to,
            })
            .await
            .map_err(|_| OrderError::ServiceUnavailable)?;
        response.await.map_err(|_| OrderError::ServiceUnavailable)?
    }

    /// Cancels an order that is still PENDING or CONFIRMED as the order desk
    /// sees it, and broadcasts `order.cancelled` to every workflow.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(OrderDeskRequest::Cancel {
                order_id: order_id.to_string(),
                respond_to,
            })
            .await
            .map_err(|_| OrderError::ServiceUnavailable)?;
        response.await.map_err(|_| OrderError::ServiceUnavailable)?
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(OrderDeskRequest::Get {
                order_id: order_id.to_string(),
                respond_to,
            })
            .await
            .map_err(|_| OrderError::ServiceUnavailable)?;
        response.await.map_err(|_| OrderError::ServiceUnavailable)?
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(OrderDeskRequest::List { respond_to })
            .await
            .map_err(|_| OrderError::ServiceUnavailable)?;
        response.await.map_err(|_| OrderError::ServiceUnavailable)
    }

    pub async fn list_restaurants(&self) -> Result<Vec<Restaurant>, OrderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(OrderDeskRequest::Restaurants { respond_to })
            .await
            .map_err(|_| OrderError::ServiceUnavailable)?;
        response.await.map_err(|_| OrderError::ServiceUnavailable)
    }
}
