//! Endpoint registry — the ordered set of delivery bots.
//!
//! Registration order is fallback order: delivery tries endpoints first to
//! last. The registry also answers the "is this one of us?" questions used
//! for loopback and mention detection.

use std::sync::Arc;

use parley_core::endpoint::{Endpoint, InboundEvent, OutboundItem};
use parley_core::error::EndpointError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Inbound events from every endpoint, tagged with the endpoint name.
pub type MergedInbound = mpsc::Receiver<(String, Result<InboundEvent, EndpointError>)>;

/// A successful group send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Endpoint that accepted the items
    pub endpoint: String,
    /// One platform message ID per item, in order
    pub message_ids: Vec<String>,
}

/// Central registry holding all enabled endpoints, in fallback order.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<dyn Endpoint>>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. An endpoint with the same name is replaced in place.
    pub fn register(&mut self, endpoint: Arc<dyn Endpoint>) {
        let name = endpoint.name().to_string();
        info!(endpoint = %name, self_id = %endpoint.self_id(), "Registered endpoint");
        match self.endpoints.iter().position(|e| e.name() == name) {
            Some(i) => self.endpoints[i] = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }

    /// Get an endpoint by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Endpoint>> {
        self.endpoints.iter().find(|e| e.name() == name)
    }

    /// Registered endpoint names in fallback order.
    pub fn list(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Endpoint>> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Whether an origin identifier belongs to any registered endpoint.
    pub fn is_self(&self, origin: &str) -> bool {
        self.endpoints.iter().any(|e| e.is_self(origin))
    }

    /// Whether the text mentions any endpoint's own identifier.
    pub fn mentions(&self, content: &str) -> bool {
        self.endpoints
            .iter()
            .any(|e| !e.self_id().is_empty() && content.contains(e.self_id()))
    }

    /// Start all endpoints and merge their event streams into one receiver.
    pub async fn start_all(&self) -> Result<MergedInbound, EndpointError> {
        let (merged_tx, merged_rx) = mpsc::channel(256);

        for endpoint in &self.endpoints {
            let mut rx = endpoint.start().await?;
            let tx = merged_tx.clone();
            let name = endpoint.name().to_string();

            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if tx.send((name.clone(), event)).await.is_err() {
                        break; // Merged receiver dropped
                    }
                }
            });

            info!(endpoint = %endpoint.name(), "Started endpoint");
        }

        Ok(merged_rx)
    }

    /// Send a group of items, trying endpoints in order until one accepts all of them.
    pub async fn deliver(&self, channel_id: &str, items: &[OutboundItem]) -> Result<Sent, EndpointError> {
        for endpoint in &self.endpoints {
            match endpoint.send(channel_id, items).await {
                Ok(message_ids) => {
                    debug!(endpoint = %endpoint.name(), channel_id, count = message_ids.len(), "Group delivered");
                    return Ok(Sent {
                        endpoint: endpoint.name().to_string(),
                        message_ids,
                    });
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.name(), channel_id, error = %e, "Endpoint failed to deliver, trying next");
                }
            }
        }

        Err(EndpointError::AllEndpointsFailed {
            channel_id: channel_id.to_string(),
            attempted: self.endpoints.len(),
        })
    }

    /// React through one named endpoint.
    pub async fn react_via(
        &self,
        endpoint: &str,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), EndpointError> {
        let endpoint = self
            .get(endpoint)
            .ok_or_else(|| EndpointError::NotConfigured(format!("Endpoint '{endpoint}' not found")))?;
        endpoint.react(channel_id, message_id, emoji).await
    }

    /// Attempt a reaction on every endpoint. Returns how many succeeded.
    pub async fn react_everywhere(&self, channel_id: &str, message_id: &str, emoji: &str) -> usize {
        let mut succeeded = 0;
        for endpoint in &self.endpoints {
            match endpoint.react(channel_id, message_id, emoji).await {
                Ok(()) => succeeded += 1,
                Err(e) => debug!(endpoint = %endpoint.name(), emoji, error = %e, "Reaction failed"),
            }
        }
        succeeded
    }

    /// Stop all endpoints gracefully.
    pub async fn stop_all(&self) {
        for endpoint in &self.endpoints {
            if let Err(e) = endpoint.stop().await {
                warn!(endpoint = %endpoint.name(), error = %e, "Failed to stop endpoint");
            }
        }
    }

    /// Run health checks on all endpoints, in registration order.
    pub async fn health_check_all(&self) -> Vec<(String, bool)> {
        let mut results = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let healthy = endpoint.health_check().await.unwrap_or(false);
            results.push((endpoint.name().to_string(), healthy));
        }
        results
    }
}
