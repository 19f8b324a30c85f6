//! The orchestration engine — the heart of Parley.
//!
//! A chat message travels through the engine in stages:
//!
//! 1. **Settle** — rapid edits are coalesced by the debouncer
//! 2. **Ingest** — names are resolved, the record is stamped and persisted
//! 3. **Trigger** — a probability roll decides whether to answer
//! 4. **Generate** — the model sees the context window and may call tools
//!    until it produces a structured reply
//! 5. **Deliver** — reply groups fan out across endpoints with fallback
//!
//! At most one generation runs at a time; requests arriving meanwhile
//! collapse into a single queued re-run.

pub mod context_window;
pub mod debounce;
pub mod delivery;
pub mod engine;
pub mod generator;
pub mod ingest;
pub mod output;
pub mod prompt;
pub mod scheduler;
pub mod stream_event;
pub mod trigger;

pub use context_window::ContextWindow;
pub use debounce::Debouncer;
pub use delivery::{Delivery, DeliveryReport};
pub use engine::{AttemptOutcome, Engine, EngineCommand, EngineHandle, EngineParts};
pub use generator::{Generator, GeneratorSettings};
pub use ingest::{ChannelFilter, Ingestor, MonotonicClock, Settled};
pub use output::{ReplyGroup, ReplyPlan, ReplySegment, parse_reply, reply_schema};
pub use prompt::PromptBuilder;
pub use scheduler::{Admission, GenerationScheduler};
pub use stream_event::GenerationEvent;
pub use trigger::{Dice, RandomDice, TriggerController, TriggerSignal};
