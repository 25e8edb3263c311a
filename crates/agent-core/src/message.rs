//! Conversation Messages
//!
//! Standard message format used across the agent system. A [`Conversation`]
//! is the append-only transcript of one dialogue; insertion order is replay
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System policy / instructions
    System,
    /// Operator input
    User,
    /// Agent response
    Assistant,
    /// Capability result (fed back to the engine, never stored in a transcript)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Additional message metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Tool call ID (for tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Model that generated this (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        if tool_call_id.is_some() {
            msg.metadata = Some(MessageMetadata {
                tool_call_id,
                ..Default::default()
            });
        }
        msg
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token, +4 for role overhead
        u32::try_from(self.content.len() / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// Append-only conversation transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Budget for the slice handed to the reasoning engine (estimated tokens)
    #[serde(default = "default_max_context")]
    max_context_tokens: u32,
}

const fn default_max_context() -> u32 {
    8192
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            max_context_tokens: default_max_context(),
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_context(max_context_tokens: u32) -> Self {
        Self {
            messages: Vec::new(),
            max_context_tokens,
        }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Most recent suffix of the transcript that fits the context budget.
    ///
    /// The transcript itself is never trimmed; older turns just stop being
    /// replayed to the engine. The window always opens on an operator turn,
    /// so a reply is never replayed without the question it answered.
    pub fn context_window(&self) -> &[Message] {
        let mut used = 0u32;
        let mut start = self.messages.len();
        for (idx, msg) in self.messages.iter().enumerate().rev() {
            used = used.saturating_add(msg.estimate_tokens());
            if used > self.max_context_tokens {
                break;
            }
            start = idx;
        }
        let start = self.messages[start..]
            .iter()
            .position(|msg| msg.role == Role::User)
            .map_or(self.messages.len(), |offset| start + offset);
        &self.messages[start..]
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Check status of CNC-01");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Check status of CNC-01");
    }

    #[test]
    fn test_conversation_order() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("Hello!"));

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_context_window_keeps_recent_turns() {
        let mut conv = Conversation::with_max_context(40);
        for i in 0..10 {
            conv.push(Message::user(format!("message number {i} with some padding")));
        }

        let window = conv.context_window();
        assert!(!window.is_empty());
        assert!(window.len() < conv.len());
        assert_eq!(
            window.last().unwrap().content,
            conv.last().unwrap().content
        );
        // transcript untouched
        assert_eq!(conv.len(), 10);
    }

    #[test]
    fn test_context_window_starts_on_user_turn() {
        // 80-char questions cost 24 tokens, "ok" replies cost 4
        let mut conv = Conversation::with_max_context(40);
        for _ in 0..3 {
            conv.push(Message::user("x".repeat(80)));
            conv.push(Message::assistant("ok"));
        }

        // 4 + 24 + 4 fits, so the raw cut would open on a reply
        let window = conv.context_window();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[1].role, Role::Assistant);

        let mut tight = Conversation::with_max_context(4);
        tight.push(Message::user("x".repeat(80)));
        tight.push(Message::assistant("ok"));
        assert!(tight.context_window().is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
