//! `parley history` — Print the most recent stored messages.

use chrono::{Local, TimeZone};
use parley_config::AppConfig;
use parley_core::message::Role;

pub async fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = parley_history::open(&config.history.backend, &config.history_path())
        .await
        .map_err(|e| format!("Failed to open history: {e}"))?;

    let messages = store.recent(limit).await?;
    if messages.is_empty() {
        println!("  No messages stored in '{}' history.", store.name());
        return Ok(());
    }

    for m in &messages {
        let time = Local
            .timestamp_millis_opt(m.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| m.timestamp.to_string());
        let marker = match m.role {
            Role::Assistant => "*",
            _ if m.need_reply => "!",
            _ => " ",
        };
        let channel = m.channel_name.as_deref().unwrap_or(&m.channel_id);
        println!("{marker} [{time}] #{channel} {} ({}): {}", m.sender_name, m.message_id, m.content);
    }
    println!("\n  {} message(s). * = persona, ! = awaiting reply", messages.len());

    Ok(())
}
