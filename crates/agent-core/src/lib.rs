//! # agent-core
//!
//! Provider-agnostic agent machinery: conversation turns, capability
//! schemas, the reasoning-engine strategy trait and a bounded
//! capability-invocation loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Bounded    │  │    Tool     │  │   LlmProvider       │  │
//! │  │  Tool Loop  │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop never commits anything to a transcript. It hands back a
//! [`TurnOutcome`] so the caller decides what a finished turn looks like
//! and can apply its own policy to every invocation that happened.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;
pub mod session;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentConfig, Invocation, TurnOutcome};
pub use session::{Session, SessionId};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
