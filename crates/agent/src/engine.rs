//! The engine actor — sole owner of the agent state.
//!
//! Every state change happens on one task fed by an `mpsc` command channel:
//!
//! 1. **Ingest** — persist a settled message, append it to the mirror, grow
//!    the context window, and roll the trigger
//! 2. **Start** — when the scheduler admits an attempt, snapshot the window,
//!    clear `need_reply`, and spawn generation + delivery
//! 3. **Finished** — record the outcome, re-engage on success, and start the
//!    queued re-run if there is one
//!
//! Endpoint events reach the actor through the debounce aggregator and the
//! ingestion pipeline (see [`Engine::attach`]).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_config::AppConfig;
use parley_core::agent::{AgentStatus, GenerationPhase};
use parley_core::endpoint::{InboundEvent, InboundKind};
use parley_core::error::Error;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::history::{HistoryMirror, HistoryStore};
use parley_core::lookup::AbbreviationLookup;
use parley_core::provider::Provider;
use parley_endpoints::{EndpointRegistry, MergedInbound};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context_window::ContextWindow;
use crate::debounce::Debouncer;
use crate::delivery::{Delivery, DeliveryReport};
use crate::generator::{Generator, GeneratorSettings};
use crate::ingest::{ChannelFilter, Ingestor, MonotonicClock, Settled};
use crate::prompt::PromptBuilder;
use crate::scheduler::{Admission, GenerationScheduler};
use crate::stream_event::GenerationEvent;
use crate::trigger::{Dice, RandomDice, TriggerController, TriggerSignal};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Messages processed by the engine actor.
pub enum EngineCommand {
    Ingest(Settled),
    Finished(AttemptOutcome),
    Status(oneshot::Sender<AgentStatus>),
    Shutdown,
}

/// Result of one generation attempt.
pub struct AttemptOutcome {
    pub attempt: u64,
    pub result: Result<DeliveryReport, Error>,
}

impl AttemptOutcome {
    /// A reply reached the chat.
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(report) if report.any_delivered())
    }
}

/// Everything the engine needs from the outside world.
pub struct EngineParts {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub history: Arc<dyn HistoryStore>,
    pub endpoints: Arc<EndpointRegistry>,
    pub lookup: Option<Arc<dyn AbbreviationLookup>>,
    pub event_bus: Arc<EventBus>,
    pub dice: Box<dyn Dice>,
}

impl EngineParts {
    /// Parts with random trigger rolls.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        history: Arc<dyn HistoryStore>,
        endpoints: Arc<EndpointRegistry>,
    ) -> Self {
        Self {
            config,
            provider,
            history,
            endpoints,
            lookup: None,
            event_bus: Arc::new(EventBus::default()),
            dice: Box::new(RandomDice),
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn AbbreviationLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_dice(mut self, dice: Box<dyn Dice>) -> Self {
        self.dice = dice;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }
}

/// Mutable agent state. Only the actor touches it.
struct AgentState {
    mirror: HistoryMirror,
    window: ContextWindow,
    trigger: TriggerController,
    scheduler: GenerationScheduler,
    attempts_started: u64,
    attempts_succeeded: u64,
}

pub struct Engine {
    state: AgentState,
    config: AppConfig,
    history: Arc<dyn HistoryStore>,
    endpoints: Arc<EndpointRegistry>,
    generator: Arc<Generator>,
    delivery: Arc<Delivery>,
    dice: Box<dyn Dice>,
    event_bus: Arc<EventBus>,
    last_timestamp: i64,
    cmd_tx: mpsc::Sender<EngineCommand>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
}

/// Cheap, cloneable access to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    mirror: HistoryMirror,
}

impl EngineHandle {
    /// Feed a settled message straight to the actor, bypassing debounce.
    pub async fn ingest(&self, settled: Settled) -> Result<(), Error> {
        self.tx
            .send(EngineCommand::Ingest(settled))
            .await
            .map_err(|_| Error::Internal("engine stopped".into()))
    }

    pub async fn status(&self) -> Result<AgentStatus, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Status(reply_tx))
            .await
            .map_err(|_| Error::Internal("engine stopped".into()))?;
        reply_rx.await.map_err(|_| Error::Internal("engine stopped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineCommand::Shutdown).await;
    }

    /// Wait until no attempt is running or queued.
    pub async fn wait_idle(&self) -> Result<(), Error> {
        while self.status().await?.phase != GenerationPhase::Idle {
            tokio::time::sleep(IDLE_POLL).await;
        }
        Ok(())
    }

    /// Read-only view of the in-memory history.
    pub fn mirror(&self) -> &HistoryMirror {
        &self.mirror
    }
}

impl Engine {
    /// Load the history and assemble the engine.
    pub async fn new(parts: EngineParts) -> Result<Self, Error> {
        let loaded = parts.history.bulk_load().await?;
        let last_timestamp = loaded.last().map(|m| m.timestamp).unwrap_or_default();
        info!(backend = %parts.history.name(), messages = loaded.len(), "History loaded");

        let window = ContextWindow::new(&parts.config.context, loaded.len());
        let mirror = HistoryMirror::from_loaded(loaded);

        let tools = parley_tools::default_registry(mirror.clone(), parts.endpoints.clone(), parts.lookup);
        let generator = Generator::new(
            parts.provider,
            Arc::new(tools),
            PromptBuilder::new(parts.config.persona.clone()),
            GeneratorSettings::from_config(&parts.config),
            parts.event_bus.clone(),
        );
        let delivery = Delivery::new(parts.endpoints.clone(), parts.event_bus.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        Ok(Self {
            state: AgentState {
                mirror,
                window,
                trigger: TriggerController::new(&parts.config.trigger),
                scheduler: GenerationScheduler::new(),
                attempts_started: 0,
                attempts_succeeded: 0,
            },
            config: parts.config,
            history: parts.history,
            endpoints: parts.endpoints,
            generator: Arc::new(generator),
            delivery: Arc::new(delivery),
            dice: parts.dice,
            event_bus: parts.event_bus,
            last_timestamp,
            cmd_tx,
            cmd_rx,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.cmd_tx.clone(),
            mirror: self.state.mirror.clone(),
        }
    }

    /// Follow model output and tool activity live.
    pub fn subscribe_generation(&self) -> broadcast::Receiver<GenerationEvent> {
        self.generator.subscribe()
    }

    /// Route endpoint events through the channel filter, debounce, and
    /// ingestion into this engine.
    ///
    /// The returned task ends once the inbound stream has closed and every
    /// message still settling has been handed to the actor.
    pub fn attach(&self, mut inbound: MergedInbound) -> JoinHandle<()> {
        let (debouncer, mut settled_rx) =
            Debouncer::<(String, String), InboundEvent>::new(Duration::from_millis(self.config.debounce.delay_ms));
        let filter = ChannelFilter::new(self.config.channels.allowed.clone());

        let mut ingestor = Ingestor::new(
            self.endpoints.clone(),
            self.config.placeholders.clone(),
            self.config.persona.name.clone(),
            MonotonicClock::starting_after(self.last_timestamp),
        );
        let cmd_tx = self.cmd_tx.clone();
        let ingest = tokio::spawn(async move {
            while let Some(event) = settled_rx.recv().await {
                if let Some(settled) = ingestor.prepare(event).await
                    && cmd_tx.send(EngineCommand::Ingest(settled)).await.is_err()
                {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some((endpoint, event)) = inbound.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "Endpoint reported an error");
                        continue;
                    }
                };
                if !filter.accepts(&event.session.channel_id) {
                    debug!(channel_id = %event.session.channel_id, "Ignoring message outside allowed channels");
                    continue;
                }

                // Several endpoints may see the same message; they coalesce here
                let key = (event.session.channel_id.clone(), event.session.message_id.clone());
                match event.kind {
                    InboundKind::Message => debouncer.on_message(key, event).await,
                    InboundKind::Edit => {
                        debouncer.on_edit(&key, event).await;
                    }
                }
            }
            let pending = debouncer.pending().await;
            debug!(pending, "Inbound stream closed, draining");
            // Timers hold their own senders; the settled stream ends after the last one fires
            drop(debouncer);
            let _ = ingest.await;
        })
    }

    /// Process commands until shutdown.
    pub async fn run(mut self) {
        let history = self.state.mirror.len().await;
        info!(
            persona = %self.config.persona.name,
            endpoints = self.endpoints.len(),
            history,
            "Engine running"
        );

        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                EngineCommand::Ingest(settled) => self.on_settled(settled).await,
                EngineCommand::Finished(outcome) => self.on_finished(outcome).await,
                EngineCommand::Status(reply) => {
                    let _ = reply.send(self.status().await);
                }
                EngineCommand::Shutdown => break,
            }
        }

        info!("Engine stopped");
    }

    async fn status(&mut self) -> AgentStatus {
        let state = &self.state;
        AgentStatus {
            phase: state.scheduler.phase(),
            probability: state.trigger.probability(),
            context_window: state.window.size(),
            history_len: state.mirror.len().await,
            attempts_started: state.attempts_started,
            attempts_succeeded: state.attempts_succeeded,
        }
    }

    async fn on_settled(&mut self, settled: Settled) {
        let Settled { message, signal } = settled;

        // Durable append first; on failure the message is not seen at all
        if let Err(e) = self.history.upsert(std::slice::from_ref(&message)).await {
            error!(message_id = %message.message_id, error = %e, "Failed to persist message");
            self.event_bus.publish(DomainEvent::ErrorOccurred {
                context: "history.upsert".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            return;
        }

        self.event_bus.publish(DomainEvent::MessageSettled {
            channel_id: message.channel_id.clone(),
            message_id: message.message_id.clone(),
            sender_id: message.sender_id.clone(),
            content_preview: message.content.chars().take(80).collect(),
            loopback: signal == TriggerSignal::Loopback,
            timestamp: Utc::now(),
        });
        self.state.mirror.push(message).await;
        self.state.window.on_append();

        let probability = self.state.trigger.observe(signal);
        let roll = self.dice.roll();
        let triggered = self.state.trigger.decide(roll);
        debug!(?signal, probability, roll, triggered, "Trigger evaluated");
        self.event_bus.publish(DomainEvent::TriggerEvaluated {
            probability,
            roll,
            triggered,
            timestamp: Utc::now(),
        });

        if !triggered {
            return;
        }
        match self.state.scheduler.request() {
            Admission::Start => self.start_attempt().await,
            Admission::Queued => debug!("Generation running, re-run queued"),
            Admission::Dropped => debug!("Generation re-run already queued"),
        }
    }

    async fn start_attempt(&mut self) {
        self.state.attempts_started += 1;
        let attempt = self.state.attempts_started;

        let history_len = self.state.mirror.len().await;
        let snapshot = self.state.mirror.tail(self.state.window.bound(history_len)).await;

        let cleared = self.state.mirror.clear_need_reply().await;
        if !cleared.is_empty()
            && let Err(e) = self.history.upsert(&cleared).await
        {
            warn!(records = cleared.len(), error = %e, "Failed to persist need_reply reset");
        }

        info!(attempt, context = snapshot.len(), "Generation started");
        self.event_bus.publish(DomainEvent::GenerationStarted {
            attempt,
            context_len: snapshot.len(),
            timestamp: Utc::now(),
        });

        let generator = self.generator.clone();
        let delivery = self.delivery.clone();
        let event_bus = self.event_bus.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = match generator.generate(attempt, &snapshot).await {
                Ok(plan) if plan.is_silent() => {
                    debug!(attempt, "Model chose to stay silent");
                    Ok(DeliveryReport::default())
                }
                Ok(plan) => Ok(delivery.deliver(&plan).await),
                Err(e) => {
                    match &e {
                        Error::Validation(v) => warn!(attempt, error = %v, "Discarding reply that failed validation"),
                        other => error!(attempt, error = %other, "Generation failed"),
                    }
                    event_bus.publish(DomainEvent::ErrorOccurred {
                        context: format!("generation attempt {attempt}"),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    Err(e)
                }
            };
            let _ = cmd_tx.send(EngineCommand::Finished(AttemptOutcome { attempt, result })).await;
        });
    }

    async fn on_finished(&mut self, outcome: AttemptOutcome) {
        let success = outcome.succeeded();
        if success {
            self.state.attempts_succeeded += 1;
            self.state.trigger.on_success();
        }
        let groups_delivered = outcome.result.as_ref().map(|r| r.groups_delivered).unwrap_or(0);
        info!(attempt = outcome.attempt, success, groups_delivered, "Generation finished");
        self.event_bus.publish(DomainEvent::GenerationCompleted {
            attempt: outcome.attempt,
            success,
            groups_delivered,
            timestamp: Utc::now(),
        });

        if self.state.scheduler.complete() {
            self.start_attempt().await;
        }
    }
}
