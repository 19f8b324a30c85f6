//! Trigger controller — decides whether a settled message gets a reply.
//!
//! Holds a single reply probability `p`. Plain chatter decays it towards the
//! configured baseline, a mention forces it to 1, and the agent's own echoed
//! messages force it to 0 so it never answers itself. A successful reply
//! while `p` is low raises it back to 1 to keep an active conversation going.

use parley_config::TriggerConfig;

/// How a settled message affects the reply probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSignal {
    /// Ordinary chatter
    Plain,
    /// Mentions the persona or one of its endpoints
    Mention,
    /// Sent by one of our own endpoints
    Loopback,
}

impl TriggerSignal {
    /// Loopback wins over mention.
    pub fn classify(loopback: bool, mentioned: bool) -> Self {
        if loopback {
            Self::Loopback
        } else if mentioned {
            Self::Mention
        } else {
            Self::Plain
        }
    }
}

/// A source of uniform rolls in `[0, 1)`.
pub trait Dice: Send {
    fn roll(&mut self) -> f64;
}

/// Thread-local RNG dice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl Dice for RandomDice {
    fn roll(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

#[derive(Debug, Clone)]
pub struct TriggerController {
    baseline: f64,
    decay_step: f64,
    reengage_threshold: f64,
    p: f64,
}

impl TriggerController {
    pub fn new(config: &TriggerConfig) -> Self {
        Self {
            baseline: config.baseline,
            decay_step: config.decay_step,
            reengage_threshold: config.reengage_threshold,
            p: config.baseline,
        }
    }

    /// Current reply probability.
    pub fn probability(&self) -> f64 {
        self.p
    }

    /// Apply a settled message's signal. Returns the updated probability.
    pub fn observe(&mut self, signal: TriggerSignal) -> f64 {
        self.p = match signal {
            TriggerSignal::Plain => (self.p - self.decay_step).max(self.baseline),
            TriggerSignal::Mention => 1.0,
            TriggerSignal::Loopback => 0.0,
        };
        self.p
    }

    /// Whether a roll in `[0, 1)` clears the current probability.
    pub fn decide(&self, roll: f64) -> bool {
        roll < self.p
    }

    /// Called after an admitted attempt delivered a reply.
    pub fn on_success(&mut self) {
        if self.p < self.reengage_threshold {
            self.p = 1.0;
        }
    }
}
