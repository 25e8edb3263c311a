//! # industria
//!
//! Maintenance agent for a fleet of industrial machines. An operator asks
//! about a machine in plain language; the reasoning engine fetches live
//! telemetry and explains what it sees, while a deterministic safety policy
//! decides what must happen.
//!
//! ## Safety policy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  temperature        severity    ticket    emergency stop    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  < 80°C             NORMAL      -         -                 │
//! │  80°C ..= 100°C     WARNING     MEDIUM    -                 │
//! │  > 100°C            CRITICAL    HIGH      yes               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is told about the manual, but a ticket the policy requires is
//! filed by the session whether or not the engine remembers to.

pub mod capability;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod session;
pub mod surface;
pub mod svckit;
pub mod telemetry;
pub mod tickets;

pub use capability::{Capability, CapabilityRequest};
pub use config::IndustriaConfig;
pub use error::{IndustriaError, Result};
pub use model::{
    Directive, MachineReading, MachineStatus, MaintenanceTicket, SeverityLevel,
    TicketConfirmation, TicketPriority, VibrationLevel,
};
pub use policy::{PolicyEngine, PolicyThresholds};
pub use session::{MaintenanceSession, SessionFactory, TurnReport, TurnState, TurnStatus};
pub use surface::{Alert, ConsoleSurface, DialogueSurface, RecordingSurface};
pub use telemetry::{MockTelemetryProvider, TelemetryProvider};
pub use tickets::{InMemoryTicketSink, TicketRetry, TicketSink};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{TelemetryLookupTool, TicketLoggerTool};
}

/// Persona and working rules for the reasoning engine
pub const INDUSTRIA_PROMPT: &str = r#"You are Industria, an expert site reliability engineer for a manufacturing plant.

## How to Work

1. ALWAYS check live telemetry with `get_machine_telemetry` before commenting on a machine.
   Never guess a temperature or a status.
2. Explain your reasoning by referring to the maintenance manual below.
3. If a machine is in the Warning band, log a MEDIUM ticket with `log_maintenance_ticket`.
4. If a machine is CRITICAL you MUST log a HIGH ticket and tell the operator to perform
   an EMERGENCY STOP.
5. If a machine ID is not found, say so and suggest the known machines.
6. Questions that need no telemetry can be answered directly.

Keep answers short: the operator is standing on the shop floor."#;

/// Full system prompt: persona followed by the manual for `policy`'s thresholds
pub fn system_prompt(policy: &PolicyEngine) -> String {
    format!("{INDUSTRIA_PROMPT}\n\n{}", policy.manual())
}
