//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat agent
//! orchestrator. This crate has **no framework dependencies** — it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] — the streaming language model
//! - [`Endpoint`] — a delivery endpoint ("bot") that receives and sends chat messages
//! - [`HistoryStore`] — the durable message log
//! - [`Tool`] — a function the model may call mid-generation
//! - [`AbbreviationLookup`] — the slang-acronym expansion service
//!
//! Implementations live in their respective crates, so the orchestration
//! engine can be tested against in-process doubles.

pub mod agent;
pub mod chat;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod history;
pub mod lookup;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentStatus, GenerationPhase, Persona};
pub use chat::{ChatMessage, PromptEnvelope, RedactedMessage};
pub use endpoint::{Endpoint, InboundEvent, InboundKind, OutboundItem, Session};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use history::{HistoryMirror, HistoryStore};
pub use lookup::AbbreviationLookup;
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, StreamChunk};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
