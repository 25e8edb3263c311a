//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Reasoning engine returned an error response
    #[error("Provider error: {0}")]
    Provider(String),

    /// Reasoning engine unreachable (network failure, server down)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Reasoning engine rejected our credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An external call did not return within its bound
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// Capability name not present in the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Capability arguments do not match the declared schema
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Capability ran and failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Schema rejected at registration time
    #[error("Tool registration error: {0}")]
    Registration(String),

    /// Bounded loop exhausted
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Too many capability invocations in a single turn
    #[error("Maximum tool invocations ({0}) reached")]
    MaxToolCalls(usize),

    /// Parse error (e.g., tool call parsing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Timeout { .. }
        )
    }

    /// True for errors raised while dispatching a capability request
    /// (unknown name or malformed arguments).
    pub const fn is_dispatch_error(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::ToolValidation(_))
    }

    /// True when the reasoning engine itself could not be reached or used.
    pub const fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::ProviderUnavailable(_) | Self::Auth(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The reasoning service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The reasoning service is currently unavailable. Please try again.".into()
            }
            Self::Auth(_) => {
                "The reasoning service rejected our credentials. Please check the configuration."
                    .into()
            }
            Self::Timeout { operation, .. } => {
                format!("The {operation} did not respond in time.")
            }
            Self::ToolNotFound(name) => format!("The capability '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid capability request: {msg}"),
            Self::ToolExecution(msg) => format!("Capability error: {msg}"),
            Self::MaxIterations(_) | Self::MaxToolCalls(_) => {
                "The request needed too many steps to process. Please try a simpler query.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
