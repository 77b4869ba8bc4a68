//! Stock update notifications published after a movement commits.
//!
//! Delivery is at-most-once. A publish failure is the publisher's problem to
//! log; it never changes the outcome of the committed movement.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::MovementType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateEvent {
    pub movement_id: i64,
    pub store_id: i64,
    pub product_id: i64,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &StockUpdateEvent) -> Result<(), PublishError>;
}

/// Queue stand-in that writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &StockUpdateEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(event = %payload, "[QUEUE STUB] Queuing stock update event");
        Ok(())
    }
}
