use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the service layer after their triggering transaction
/// has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ItemListed(Uuid),
    CartEntryAdded {
        user_id: Uuid,
        item_id: Uuid,
    },
    OrderPlaced {
        order_id: Uuid,
        buyer_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    MessageSent {
        order_id: Uuid,
        message_id: Uuid,
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

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send: a full or closed channel is logged, never
    /// propagated to the operation that emitted the event.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Dropping event");
        }
    }
}

/// Consumes events off the channel and logs them. Runs for the lifetime of
/// the process as a spawned task.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ItemListed(item_id) => {
                info!(%item_id, "Item listed");
            }
            Event::CartEntryAdded { user_id, item_id } => {
                info!(%user_id, %item_id, "Cart entry added");
            }
            Event::OrderPlaced { order_id, buyer_id } => {
                info!(%order_id, %buyer_id, "Order placed");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
            }
            Event::MessageSent {
                order_id,
                message_id,
            } => {
                info!(%order_id, %message_id, "Message sent");
            }
        }
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let item_id = Uuid::new_v4();
        sender.send(Event::ItemListed(item_id)).await.unwrap();
        sender
            .send(Event::OrderPlaced {
                order_id: Uuid::new_v4(),
                buyer_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Event::ItemListed(id)) if id == item_id));
        assert!(matches!(rx.recv().await, Some(Event::OrderPlaced { .. })));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or return an error to the caller.
        sender.send_or_log(Event::ItemListed(Uuid::new_v4())).await;
    }
}
