//! Persona profile and agent status types.

use serde::{Deserialize, Serialize};

/// Who the agent pretends to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_age")]
    pub age: u32,

    #[serde(default = "default_gender")]
    pub gender: String,

    #[serde(default = "default_personality")]
    pub personality: String,

    #[serde(default = "default_profession")]
    pub profession: String,

    #[serde(default = "default_hobbies")]
    pub hobbies: Vec<String>,

    #[serde(default)]
    pub hates: Vec<String>,
}

fn default_name() -> String {
    "Xiaoming".into()
}
fn default_age() -> u32 {
    18
}
fn default_gender() -> String {
    "male".into()
}
fn default_personality() -> String {
    "cheerful, warm, optimistic".into()
}
fn default_profession() -> String {
    "student".into()
}
fn default_hobbies() -> Vec<String> {
    vec!["chatting".into(), "games".into(), "music".into()]
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: default_name(),
            age: default_age(),
            gender: default_gender(),
            personality: default_personality(),
            profession: default_profession(),
            hobbies: default_hobbies(),
            hates: Vec::new(),
        }
    }
}

/// Generation scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    /// No attempt in flight
    #[default]
    Idle,
    /// One attempt in flight
    Running,
    /// One attempt in flight and exactly one re-trigger queued
    RunningQueued,
}

/// Diagnostic snapshot of the running agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStatus {
    pub phase: GenerationPhase,

    /// Current trigger probability
    pub probability: f64,

    /// Current context-window size
    pub context_window: usize,

    /// Messages in the in-memory mirror
    pub history_len: usize,

    /// Attempts started since startup
    pub attempts_started: u64,

    /// Attempts that delivered at least one group
    pub attempts_succeeded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_defaults_fill_missing_fields() {
        let persona: Persona = serde_json::from_str(r#"{"name":"Mei"}"#).unwrap();
        assert_eq!(persona.name, "Mei");
        assert_eq!(persona.age, 18);
        assert_eq!(persona.profession, "student");
        assert!(persona.hates.is_empty());
    }

    #[test]
    fn status_starts_idle() {
        let status = AgentStatus::default();
        assert_eq!(status.phase, GenerationPhase::Idle);
        assert_eq!(status.attempts_started, 0);
        assert_eq!(serde_json::to_value(GenerationPhase::RunningQueued).unwrap(), "running_queued");
    }
}
