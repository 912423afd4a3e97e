//! Client for the notification service's diagnostic history.

use tokio::sync::{mpsc, oneshot};

use crate::clients::ClientError;
use crate::notifications::{NotificationQuery, Receipt};

/// Read-only view of the append-only send history.
#[derive(Clone)]
pub struct NotificationClient {
    sender: mpsc::Sender<NotificationQuery>,
}

impl NotificationClient {
    pub(crate) fn new(sender: mpsc::Sender<NotificationQuery>) -> Self {
        Self { sender }
    }

    /// Every receipt recorded so far, in send order.
    pub async fn history(&self) -> Result<Vec<Receipt>, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(NotificationQuery::History { respond_to })
            .await
            .map_err(|_| ClientError::ServiceClosed)?;
        response.await.map_err(|_| ClientError::ServiceDropped)
    }
}
