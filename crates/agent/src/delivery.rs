//! Delivery fan-out — sends a validated reply through the endpoints.
//!
//! Each group goes out as one batch on the first endpoint that accepts it.
//! Segment reactions are then attached on that same endpoint to the last
//! message the segment produced. A group no endpoint accepts is reported and
//! skipped; later groups still go out.

use std::sync::Arc;

use chrono::Utc;
use parley_core::endpoint::OutboundItem;
use parley_core::error::EndpointError;
use parley_core::event::{DomainEvent, EventBus};
use parley_endpoints::EndpointRegistry;
use tracing::{debug, error, warn};

use crate::output::{ReplyGroup, ReplyPlan};

/// What happened to a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub groups_delivered: usize,
    pub groups_failed: usize,
    pub messages_sent: usize,
    pub reactions_added: usize,
    pub reactions_failed: usize,
}

impl DeliveryReport {
    /// At least one group reached the chat.
    pub fn any_delivered(&self) -> bool {
        self.groups_delivered > 0
    }
}

/// A group flattened into outbound items.
struct Batch {
    items: Vec<OutboundItem>,
    /// Per segment: index of its last item and the reactions for it
    reactions: Vec<(usize, Vec<String>)>,
}

fn flatten(group: &ReplyGroup) -> Batch {
    let mut items = Vec::new();
    let mut reactions = Vec::new();

    for segment in &group.segments {
        for (i, content) in segment.bubbles().enumerate() {
            items.push(OutboundItem {
                content: content.to_string(),
                quote: if i == 0 { segment.quote_message_id.clone() } else { None },
            });
        }
        if !segment.reactions().is_empty() && !items.is_empty() {
            reactions.push((items.len() - 1, segment.reactions().to_vec()));
        }
    }

    Batch { items, reactions }
}

pub struct Delivery {
    endpoints: Arc<EndpointRegistry>,
    event_bus: Arc<EventBus>,
}

impl Delivery {
    pub fn new(endpoints: Arc<EndpointRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self { endpoints, event_bus }
    }

    pub async fn deliver(&self, plan: &ReplyPlan) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for group in &plan.groups {
            let batch = flatten(group);
            if batch.items.is_empty() {
                continue;
            }

            let sent = match self.endpoints.deliver(&group.channel_id, &batch.items).await {
                Ok(sent) => sent,
                Err(e) => {
                    let attempted = match &e {
                        EndpointError::AllEndpointsFailed { attempted, .. } => *attempted,
                        _ => self.endpoints.len(),
                    };
                    error!(channel_id = %group.channel_id, attempted, error = %e, "Every endpoint failed to deliver group");
                    self.event_bus.publish(DomainEvent::DeliveryFailed {
                        channel_id: group.channel_id.clone(),
                        attempted,
                        timestamp: Utc::now(),
                    });
                    report.groups_failed += 1;
                    continue;
                }
            };

            report.groups_delivered += 1;
            report.messages_sent += sent.message_ids.len();

            for (last_item, emojis) in &batch.reactions {
                let Some(target) = sent.message_ids.get(*last_item).or(sent.message_ids.last()) else {
                    continue;
                };
                for emoji in emojis {
                    match self
                        .endpoints
                        .react_via(&sent.endpoint, &group.channel_id, target, emoji)
                        .await
                    {
                        Ok(()) => report.reactions_added += 1,
                        Err(e) => {
                            warn!(endpoint = %sent.endpoint, message_id = %target, emoji = %emoji, error = %e, "Reaction failed");
                            report.reactions_failed += 1;
                        }
                    }
                }
            }

            debug!(channel_id = %group.channel_id, endpoint = %sent.endpoint, messages = sent.message_ids.len(), "Group delivered");
        }

        report
    }
}
