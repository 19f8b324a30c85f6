//! Delivery endpoint implementations for Parley.
//!
//! An endpoint is one bot identity on a chat platform. Endpoints are
//! trait-based and platform-agnostic; several may serve the same channels.
//!
//! Available endpoints:
//! - **Console** — interactive terminal chat (stdin/stdout)
//! - **Local** — in-process bot with injectable events and recorded output
//! - **Registry** — ordered endpoint set with fallback delivery
//! - **Directory** — cached user/channel/guild name resolution

pub mod console;
pub mod directory;
pub mod local;
pub mod registry;

pub use console::ConsoleEndpoint;
pub use directory::{MetadataResolver, ResolvedNames};
pub use local::{LocalEndpoint, Reaction, SentBatch};
pub use registry::{EndpointRegistry, MergedInbound, Sent};

use parley_config::EndpointConfig;
use std::sync::Arc;

/// Build the registry from `[[endpoints]]`, skipping disabled entries.
///
/// Local endpoints are returned alongside so the caller can drive them.
pub fn build_registry(configs: &[EndpointConfig]) -> (EndpointRegistry, Vec<Arc<LocalEndpoint>>) {
    let mut registry = EndpointRegistry::new();
    let mut locals = Vec::new();

    for config in configs.iter().filter(|c| c.enabled) {
        match config.kind.as_str() {
            "console" => {
                registry.register(Arc::new(ConsoleEndpoint::new(&config.self_id, &config.channel_id)));
            }
            "local" => {
                let endpoint = Arc::new(LocalEndpoint::new(format!("local-{}", locals.len() + 1), &config.self_id));
                registry.register(endpoint.clone());
                locals.push(endpoint);
            }
            other => tracing::warn!(kind = %other, "Skipping unknown endpoint kind"),
        }
    }

    (registry, locals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(kind: &str, self_id: &str, enabled: bool) -> EndpointConfig {
        EndpointConfig {
            kind: kind.into(),
            self_id: self_id.into(),
            channel_id: "console".into(),
            enabled,
        }
    }

    #[test]
    fn build_registry_respects_order_and_enabled() {
        let (registry, locals) = build_registry(&[
            endpoint("local", "bot-a", true),
            endpoint("console", "parley", true),
            endpoint("local", "bot-b", false),
            endpoint("local", "bot-c", true),
        ]);
        assert_eq!(registry.list(), vec!["local-1", "console", "local-2"]);
        assert_eq!(locals.len(), 2);
        assert!(registry.is_self("local-2:bot-c"));
    }
}
