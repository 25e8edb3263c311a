//! Dialogue Surfaces
//!
//! Where turns are shown and utterances come from. The terminal console
//! and the HTTP layer both sit behind [`DialogueSurface`].

use std::collections::VecDeque;
use std::io::Write as _;

use agent_core::Message;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::model::SeverityLevel;

#[async_trait]
pub trait DialogueSurface: Send {
    /// Show a committed turn
    fn render(&mut self, turn: &Message);

    /// Out-of-band alarm, raised once per affected machine
    fn emit_alert(&mut self, severity: SeverityLevel, machine_id: &str);

    /// Next operator utterance; `None` when the operator has left
    async fn next_utterance(&mut self) -> Option<String>;
}

/// Alert raised during a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub severity: SeverityLevel,
    pub machine_id: String,
}

/// Buffers everything; fed from a queue of scripted utterances.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub turns: Vec<Message>,
    pub alerts: Vec<Alert>,
    pending: VecDeque<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utterances<I, S>(utterances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: utterances.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl DialogueSurface for RecordingSurface {
    fn render(&mut self, turn: &Message) {
        self.turns.push(turn.clone());
    }

    fn emit_alert(&mut self, severity: SeverityLevel, machine_id: &str) {
        self.alerts.push(Alert {
            severity,
            machine_id: machine_id.to_string(),
        });
    }

    async fn next_utterance(&mut self) -> Option<String> {
        self.pending.pop_front()
    }
}

/// Interactive terminal: stdin in, stdout out.
pub struct ConsoleSurface {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl DialogueSurface for ConsoleSurface {
    fn render(&mut self, turn: &Message) {
        // The operator already sees what they typed.
        if turn.role == agent_core::Role::Assistant {
            println!("\n🏭 Industria:\n{}\n", turn.content);
        }
    }

    fn emit_alert(&mut self, severity: SeverityLevel, machine_id: &str) {
        eprintln!("\x07🚨 {severity} ALERT: {machine_id}");
    }

    async fn next_utterance(&mut self) -> Option<String> {
        loop {
            print!("engineer> ");
            let _ = std::io::stdout().flush();

            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if matches!(line, "exit" | "quit") {
                        return None;
                    }
                    return Some(line.to_string());
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from stdin");
                    return None;
                }
            }
        }
    }
}
