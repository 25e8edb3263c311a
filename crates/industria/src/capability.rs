//! Capabilities
//!
//! The closed set of operations the reasoning engine may request. Names
//! coming back from the engine are resolved here into typed requests; any
//! other name is a dispatch error.

use agent_core::{AgentError, ToolCall};

use crate::model::{MaintenanceTicket, TicketPriority};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    GetMachineTelemetry,
    LogMaintenanceTicket,
}

impl Capability {
    pub const ALL: [Self; 2] = [Self::GetMachineTelemetry, Self::LogMaintenanceTicket];

    pub const fn name(self) -> &'static str {
        match self {
            Self::GetMachineTelemetry => "get_machine_telemetry",
            Self::LogMaintenanceTicket => "log_maintenance_ticket",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// A capability call with its arguments decoded
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityRequest {
    GetMachineTelemetry { machine_id: String },
    LogMaintenanceTicket(MaintenanceTicket),
}

impl CapabilityRequest {
    pub fn parse(call: &ToolCall) -> Result<Self, AgentError> {
        let capability =
            Capability::from_name(&call.name).ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        match capability {
            Capability::GetMachineTelemetry => Ok(Self::GetMachineTelemetry {
                machine_id: required(call, "machine_id")?.to_string(),
            }),
            Capability::LogMaintenanceTicket => {
                let priority = required(call, "priority")?
                    .parse::<TicketPriority>()
                    .map_err(AgentError::ToolValidation)?;
                Ok(Self::LogMaintenanceTicket(MaintenanceTicket::new(
                    required(call, "machine_id")?,
                    priority,
                    required(call, "issue")?,
                    required(call, "action")?,
                )))
            }
        }
    }
}

fn required<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str, AgentError> {
    call.str_arg(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AgentError::ToolValidation(format!("{}: '{key}' must be a non-empty string", call.name))
        })
}
