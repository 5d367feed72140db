use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Domain events emitted by the quote orchestration layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    QuoteCreated(Uuid),
    QuoteUpdated(Uuid),
    QuoteDeleted(Uuid),
}

/// Cloneable handle used by services to emit events
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("event channel closed: {e}")))
    }
}

/// Drains the event channel for the lifetime of the process. Events only feed
/// the structured log today; integrations subscribe here when they arrive.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::QuoteCreated(id) => info!(quote_id = %id, "quote created"),
            Event::QuoteUpdated(id) => info!(quote_id = %id, "quote updated"),
            Event::QuoteDeleted(id) => info!(quote_id = %id, "quote deleted"),
        }
    }
}
