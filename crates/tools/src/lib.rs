//! Built-in tool implementations for Parley.
//!
//! The persona gets a small, fixed tool set:
//! - `create_reaction` — react to a message in the history with emojis
//! - `get_message` — read a message by ID
//! - `search_abbreviation` — expand slang acronyms like "yyds"
//!
//! Each tool holds explicit handles to the state it reads.

pub mod abbreviation;
pub mod get_message;
pub mod reaction;

pub use abbreviation::{NbnhhshLookup, SearchAbbreviationTool};
pub use get_message::GetMessageTool;
pub use reaction::CreateReactionTool;

use parley_core::history::HistoryMirror;
use parley_core::lookup::AbbreviationLookup;
use parley_core::tool::ToolRegistry;
use parley_endpoints::EndpointRegistry;
use std::sync::Arc;

/// Create the tool registry. Abbreviation search is only offered when a
/// lookup service is supplied.
pub fn default_registry(
    mirror: HistoryMirror,
    endpoints: Arc<EndpointRegistry>,
    lookup: Option<Arc<dyn AbbreviationLookup>>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CreateReactionTool::new(mirror.clone(), endpoints)));
    registry.register(Box::new(GetMessageTool::new(mirror)));
    if let Some(lookup) = lookup {
        registry.register(Box::new(SearchAbbreviationTool::new(lookup)));
    }
    registry
}
