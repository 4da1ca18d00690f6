use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the replenishment core. Consumers are in-process only;
/// delivery is best-effort and never blocks the emitting transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PurchaseOrderCreated(Uuid),
    PurchaseOrderSubmitted(Uuid),
    PurchaseOrderApproved(Uuid),
    PurchaseOrderCancelled(Uuid),
    PurchaseOrderReceived {
        purchase_order_id: Uuid,
        new_status: String,
        items_processed: usize,
    },
    InventoryAccumulated {
        organization_id: Uuid,
        location_id: Uuid,
        product_id: Uuid,
        delta: Decimal,
        new_quantity: Decimal,
    },
    CostBackfillCompleted {
        items_processed: u64,
        items_updated: u64,
        items_without_resolved_cost: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and downgrades a failed send to a warning. Used after
    /// a transaction has committed, where the state change must not be
    /// reported as an error just because the listener is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains events and logs them. Spawned once at startup; tests spawn their
/// own copy so service calls never back up on a full channel.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "event processed");
    }
}
