//! Metadata resolution with caching and placeholder fallback.
//!
//! Inbound sessions carry raw IDs. Before a message is recorded the sender,
//! channel, and guild IDs are turned into display names through the
//! receiving endpoint. Successful lookups are cached; failures fall back to
//! the configured placeholders and are retried next time.

use parley_config::PlaceholderConfig;
use parley_core::endpoint::{Endpoint, Session};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    User,
    Channel,
    Guild,
}

type CacheKey = (Kind, String, String);

/// Display names for one inbound session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    pub sender_name: String,
    pub channel_name: Option<String>,
    pub guild_name: Option<String>,
}

/// Caching resolver for user, channel, and guild names.
pub struct MetadataResolver {
    placeholders: PlaceholderConfig,
    cache: RwLock<HashMap<CacheKey, String>>,
}

impl MetadataResolver {
    pub fn new(placeholders: PlaceholderConfig) -> Self {
        Self {
            placeholders,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve every name a session needs. Never fails.
    pub async fn resolve(&self, endpoint: &dyn Endpoint, session: &Session) -> ResolvedNames {
        let guild = session.guild_id.as_deref();

        let user_scope = format!("{}/{}", endpoint.name(), guild.unwrap_or_default());
        let sender_name = match self.cached(Kind::User, &user_scope, &session.sender_id).await {
            Some(name) => name,
            None => {
                let looked_up = match endpoint.resolve_user(guild, &session.sender_id).await {
                    Ok(found) => found,
                    Err(e) => {
                        debug!(endpoint = %endpoint.name(), user_id = %session.sender_id, error = %e, "User lookup degraded");
                        None
                    }
                };
                match looked_up {
                    Some(name) => self.remember(Kind::User, &user_scope, &session.sender_id, name).await,
                    None => session
                        .username
                        .clone()
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| self.placeholders.user.clone()),
                }
            }
        };

        let channel_name = self
            .lookup(Kind::Channel, endpoint, &session.channel_id)
            .await
            .unwrap_or_else(|| self.placeholders.channel.clone());

        let guild_name = match guild {
            Some(id) => Some(
                self.lookup(Kind::Guild, endpoint, id)
                    .await
                    .unwrap_or_else(|| self.placeholders.guild.clone()),
            ),
            None => None,
        };

        ResolvedNames {
            sender_name,
            channel_name: Some(channel_name),
            guild_name,
        }
    }

    async fn lookup(&self, kind: Kind, endpoint: &dyn Endpoint, id: &str) -> Option<String> {
        let scope = endpoint.name();
        if let Some(hit) = self.cached(kind, scope, id).await {
            return Some(hit);
        }

        let result = match kind {
            Kind::Channel => endpoint.resolve_channel(id).await,
            Kind::Guild => endpoint.resolve_guild(id).await,
            Kind::User => endpoint.resolve_user(None, id).await,
        };

        match result {
            Ok(Some(name)) => Some(self.remember(kind, scope, id, name).await),
            Ok(None) => None,
            Err(e) => {
                debug!(endpoint = %scope, ?kind, id, error = %e, "Metadata lookup degraded");
                None
            }
        }
    }

    async fn cached(&self, kind: Kind, scope: &str, id: &str) -> Option<String> {
        self.cache
            .read()
            .await
            .get(&(kind, scope.to_string(), id.to_string()))
            .cloned()
    }

    async fn remember(&self, kind: Kind, scope: &str, id: &str, name: String) -> String {
        self.cache
            .write()
            .await
            .insert((kind, scope.to_string(), id.to_string()), name.clone());
        name
    }

    /// Number of cached names.
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
