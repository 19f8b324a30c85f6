//! Console endpoint — chat with the persona from a terminal.
//!
//! Reads lines from stdin as messages from a local user and prints the
//! persona's messages and reactions to stdout. A line of the form
//! `/edit <message-id> <text>` edits an earlier message.

use async_trait::async_trait;
use parley_core::endpoint::{Endpoint, InboundEvent, InboundKind, OutboundItem, Session};
use parley_core::error::EndpointError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const USER_ID: &str = "console_user";

/// Interactive terminal endpoint.
pub struct ConsoleEndpoint {
    self_id: String,
    channel_id: String,
    next_in: Arc<AtomicU64>,
    next_out: AtomicU64,
}

impl ConsoleEndpoint {
    pub fn new(self_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            channel_id: channel_id.into(),
            next_in: Arc::new(AtomicU64::new(1)),
            next_out: AtomicU64::new(1),
        }
    }
}

/// Parsed console input.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Exit,
    Skip,
    Message(String),
    Edit { message_id: String, content: String },
}

fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Skip;
    }
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Line::Exit;
    }
    if let Some(rest) = line.strip_prefix("/edit ") {
        return match rest.trim().split_once(' ') {
            Some((id, content)) if !content.trim().is_empty() => Line::Edit {
                message_id: id.to_string(),
                content: content.trim().to_string(),
            },
            _ => Line::Skip,
        };
    }
    Line::Message(line.to_string())
}

fn console_session(message_id: String, channel_id: &str, content: String) -> Session {
    Session {
        message_id,
        content,
        platform: "console".into(),
        sender_id: USER_ID.into(),
        username: Some("you".into()),
        channel_id: channel_id.into(),
        guild_id: None,
        quote: None,
    }
}

#[async_trait]
impl Endpoint for ConsoleEndpoint {
    fn name(&self) -> &str {
        "console"
    }

    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<InboundEvent, EndpointError>>, EndpointError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.channel_id.clone();
        let next_in = self.next_in.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                let (kind, session) = match lines.next_line().await {
                    Ok(Some(raw)) => match parse_line(&raw) {
                        Line::Exit => break,
                        Line::Skip => continue,
                        Line::Message(content) => {
                            let id = format!("in-{}", next_in.fetch_add(1, Ordering::SeqCst));
                            println!("  [{id}]");
                            (InboundKind::Message, console_session(id, &channel_id, content))
                        }
                        Line::Edit { message_id, content } => {
                            (InboundKind::Edit, console_session(message_id, &channel_id, content))
                        }
                    },
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(EndpointError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                };

                let event = InboundEvent {
                    endpoint: "console".into(),
                    kind,
                    session,
                };
                if tx.send(Ok(event)).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, channel_id: &str, items: &[OutboundItem]) -> Result<Vec<String>, EndpointError> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = format!("out-{}", self.next_out.fetch_add(1, Ordering::SeqCst));
            match &item.quote {
                Some(quote) => println!("[{channel_id}] {} (re: {quote}) [{id}]", item.content),
                None => println!("[{channel_id}] {} [{id}]", item.content),
            }
            ids.push(id);
        }
        Ok(ids)
    }

    async fn react(&self, _channel_id: &str, message_id: &str, emoji: &str) -> Result<(), EndpointError> {
        println!("  {emoji} on {message_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_properties() {
        let ep = ConsoleEndpoint::new("parley", "console");
        assert_eq!(ep.name(), "console");
        assert_eq!(ep.self_id(), "parley");
        assert!(ep.is_self("console:parley"));
        assert!(!ep.is_self(&format!("console:{USER_ID}")));
    }

    #[test]
    fn parses_console_lines() {
        assert_eq!(parse_line("   "), Line::Skip);
        assert_eq!(parse_line(":q"), Line::Exit);
        assert_eq!(parse_line(" hello "), Line::Message("hello".into()));
        assert_eq!(
            parse_line("/edit in-3 fixed typo"),
            Line::Edit { message_id: "in-3".into(), content: "fixed typo".into() }
        );
        assert_eq!(parse_line("/edit in-3"), Line::Skip);
    }

    #[tokio::test]
    async fn send_returns_one_id_per_item() {
        let ep = ConsoleEndpoint::new("parley", "console");
        let ids = ep
            .send("console", &[OutboundItem::text("a"), OutboundItem::text("b")])
            .await
            .unwrap();
        assert_eq!(ids, vec!["out-1", "out-2"]);
    }
}
