//! Error Types for Industria

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndustriaError>;

#[derive(Error, Debug)]
pub enum IndustriaError {
    #[error("Machine ID not found. {hint}")]
    MachineNotFound { machine_id: String, hint: String },

    #[error("Invalid reading for {machine_id}: {reason}")]
    InvalidReading { machine_id: String, reason: String },

    #[error("Ticket submission failed: {0}")]
    TicketSubmission(String),

    #[error("Ticket for {machine_id} not logged after {attempts} attempts: {reason}")]
    TicketRetryExhausted {
        machine_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Agent(#[from] agent_core::AgentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndustriaError {
    /// Not-found lookups are reported back to the engine, not escalated.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::MachineNotFound { .. })
    }
}
