use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Events emitted by the reconciliation pipeline. They are drained by an
/// in-process task and logged; downstream consumers (order placement, ERP
/// sync) can subscribe by replacing the drain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A cart was mutated and persisted by the validation callback
    CartUpdated(Uuid),
    /// A customer account was created on the fly for a guest checkout
    CustomerCreated(Uuid),
    /// A cart passed validation and was marked for forced placement
    CartValidated {
        cart_id: Uuid,
        provider_order_id: String,
    },
    /// A provider-order cross-reference record was written
    ProviderOrderLinked { provider_order_id: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Event delivery is best-effort; the reconciliation result never depends
    /// on it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event channel unavailable: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::CartUpdated(cart_id) => info!(%cart_id, "cart updated"),
            Event::CustomerCreated(customer_id) => info!(%customer_id, "customer created"),
            Event::CartValidated {
                cart_id,
                provider_order_id,
            } => info!(%cart_id, %provider_order_id, "cart validated for forced placement"),
            Event::ProviderOrderLinked { provider_order_id } => {
                info!(%provider_order_id, "provider order cross-reference recorded")
            }
        }
    }
    info!("Event channel closed; drain task exiting");
}
