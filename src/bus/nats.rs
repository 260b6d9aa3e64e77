//! NATS-backed message bus

use super::{BusError, Delivery, MessageBus, Subjects};
use crate::config::BusConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info};

/// Real NATS client publisher and subscriber
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
    subjects: Subjects,
}

impl NatsBus {
    /// Connects to the configured server
    ///
    /// An unreachable server is returned as `BusError::Connect`; callers at
    /// startup treat it as fatal.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client = async_nats::connect(config.server.as_str())
            .await
            .map_err(|e| BusError::Connect {
                server: config.server.clone(),
                reason: e.to_string(),
            })?;

        info!("Connected to NATS at {}", config.server);

        Ok(Self {
            client,
            subjects: Subjects::from(config),
        })
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    /// Subscribes to the start, crawl and results subjects
    ///
    /// Returns one stream carrying deliveries from all three.
    pub async fn subscribe_all(&self) -> Result<BoxStream<'static, Delivery>, BusError> {
        let mut streams = Vec::new();

        for subject in self.subjects.all() {
            let subscriber = self
                .client
                .subscribe(subject.to_string())
                .await
                .map_err(|e| BusError::Subscribe {
                    subject: subject.to_string(),
                    reason: e.to_string(),
                })?;
            debug!("Subscribed to {}", subject);

            streams.push(
                subscriber
                    .map(|message| Delivery {
                        subject: message.subject.to_string(),
                        payload: message.payload,
                    })
                    .boxed(),
            );
        }

        Ok(stream::select_all(streams).boxed())
    }

    /// Flushes pending publishes to the server
    pub async fn flush(&self) -> Result<(), BusError> {
        self.client.flush().await.map_err(|e| BusError::Publish {
            subject: "<flush>".to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject,
                reason: e.to_string(),
            })
    }
}
