//! In-memory bus that records what would have been published
//!
//! Used by tests to inspect and replay traffic without a NATS server.

use super::{BusError, Delivery, MessageBus};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::RwLock;

/// A published message
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

impl From<PublishedMessage> for Delivery {
    fn from(message: PublishedMessage) -> Self {
        Delivery {
            subject: message.subject,
            payload: message.payload,
        }
    }
}

/// Bus that tracks published messages instead of sending them
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: RwLock<Vec<PublishedMessage>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a published message
    pub fn record_publish(&self, subject: String, payload: Bytes) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
    }

    /// Get all published messages
    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Get published messages for a specific subject
    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Get the count of messages published to a specific subject
    pub fn publish_count_for(&self, subject: &str) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .count()
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Removes and returns everything recorded so far, oldest first
    pub fn drain(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.published.write().unwrap_or_else(|e| e.into_inner()))
    }

    /// Deserialize a published message payload as JSON
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        self.record_publish(subject, payload);
        Ok(())
    }
}
