//! Message bus abstraction for production and testing
//!
//! The bus carries signals only: Start, Crawl and Results messages as JSON.
//! Delivery is assumed at-least-once, so every consumer must tolerate
//! duplicates. State lives in the store, never on the bus.

mod nats;
mod recording;

pub use nats::NatsBus;
pub use recording::{PublishedMessage, RecordingBus};

use crate::config::BusConfig;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a bus implementation
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to connect to {server}: {reason}")]
    Connect { server: String, reason: String },

    #[error("Failed to publish to {subject}: {reason}")]
    Publish { subject: String, reason: String },

    #[error("Failed to subscribe to {subject}: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Trait for publishing to the bus
///
/// This allows swapping between a real NATS connection and a recorder.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a subject
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError>;
}

/// Serializes `message` as JSON and publishes it
pub async fn publish_json<T>(
    bus: &dyn MessageBus,
    subject: &str,
    message: &T,
) -> Result<(), BusError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(message)?;
    bus.publish(subject.to_string(), Bytes::from(payload)).await
}

/// One message received from a subscription
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subject: String,
    pub payload: Bytes,
}

/// The three subjects the crawl protocol uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    pub start: String,
    pub crawl: String,
    pub results: String,
}

impl Subjects {
    pub fn all(&self) -> [&str; 3] {
        [&self.start, &self.crawl, &self.results]
    }
}

impl From<&BusConfig> for Subjects {
    fn from(config: &BusConfig) -> Self {
        Self {
            start: config.start_subject.clone(),
            crawl: config.crawl_subject.clone(),
            results: config.results_subject.clone(),
        }
    }
}
