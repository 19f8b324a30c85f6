//! Generation scheduler — single-flight with at most one queued re-run.

use parley_core::agent::GenerationPhase;

/// What happened to a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Start an attempt now
    Start,
    /// An attempt is running; one more will run after it
    Queued,
    /// A re-run is already queued
    Dropped,
}

#[derive(Debug, Default, Clone)]
pub struct GenerationScheduler {
    phase: GenerationPhase,
}

impl GenerationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn request(&mut self) -> Admission {
        let (next, admission) = match self.phase {
            GenerationPhase::Idle => (GenerationPhase::Running, Admission::Start),
            GenerationPhase::Running => (GenerationPhase::RunningQueued, Admission::Queued),
            GenerationPhase::RunningQueued => (GenerationPhase::RunningQueued, Admission::Dropped),
        };
        self.phase = next;
        admission
    }

    /// Mark the running attempt finished.
    ///
    /// Returns `true` when the queued re-run was admitted and must start now.
    pub fn complete(&mut self) -> bool {
        match self.phase {
            GenerationPhase::RunningQueued => {
                self.phase = GenerationPhase::Running;
                true
            }
            GenerationPhase::Running | GenerationPhase::Idle => {
                self.phase = GenerationPhase::Idle;
                false
            }
        }
    }
}
