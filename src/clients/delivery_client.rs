//! Client for the delivery service's query surface.

use tokio::sync::{mpsc, oneshot};

use crate::clients::ClientError;
use crate::delivery::DeliveryQuery;
use crate::model::{Driver, Order};

/// Read-only view into the delivery service: the driver pool and the
/// unassigned backlog.
#[derive(Clone)]
pub struct DeliveryClient {
    sender: mpsc::Sender<DeliveryQuery>,
}

impl DeliveryClient {
    pub(crate) fn new(sender: mpsc::Sender<DeliveryQuery>) -> Self {
        Self { sender }
    }

    /// Current state of every driver, in registration order.
    pub async fn driver_status(&self) -> Result<Vec<Driver>, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(DeliveryQuery::Drivers { respond_to })
            .await
            .map_err(|_| ClientError::ServiceClosed)?;
        response.await.map_err(|_| ClientError::ServiceDropped)
    }

    /// Orders that could not be assigned after bounded retries.
    pub async fn unassigned_orders(&self) -> Result<Vec<Order>, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(DeliveryQuery::Unassigned { respond_to })
            .await
            .map_err(|_| ClientError::ServiceClosed)?;
        response.await.map_err(|_| ClientError::ServiceDropped)
    }
}
