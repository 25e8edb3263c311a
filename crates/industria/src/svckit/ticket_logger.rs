//! Ticket Logger Tool
//!
//! `log_maintenance_ticket`: file a ticket on the engine's request.

use std::sync::Arc;

use agent_core::{
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilityRequest};
use crate::model::{MaintenanceTicket, TicketConfirmation, TicketPriority};
use crate::tickets::{TicketRetry, TicketSink, submit_with_retry};

/// Structured payload attached to a successful result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggedTicket {
    pub ticket: MaintenanceTicket,
    pub confirmation: TicketConfirmation,
}

pub struct TicketLoggerTool {
    sink: Arc<dyn TicketSink>,
    retry: TicketRetry,
}

impl TicketLoggerTool {
    pub fn new(sink: Arc<dyn TicketSink>, retry: TicketRetry) -> Self {
        Self { sink, retry }
    }
}

#[async_trait]
impl Tool for TicketLoggerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Capability::LogMaintenanceTicket.name().into(),
            description: "Log a maintenance ticket for a machine. Priority must follow the manual.".into(),
            parameters: vec![
                ParameterSchema::required_string("machine_id", "Machine identifier"),
                ParameterSchema::required_string("priority", "Ticket priority")
                    .one_of(TicketPriority::ALL.map(TicketPriority::as_str)),
                ParameterSchema::required_string("issue", "What is wrong"),
                ParameterSchema::required_string("action", "What must be done"),
            ],
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let name = Capability::LogMaintenanceTicket.name();
        let CapabilityRequest::LogMaintenanceTicket(ticket) = CapabilityRequest::parse(call)? else {
            return Err(AgentError::ToolValidation(format!("{} cannot serve {}", name, call.name)));
        };

        match submit_with_retry(self.sink.as_ref(), &ticket, self.retry).await {
            Ok(confirmation) => {
                let output = confirmation.reference.clone();
                let data = serde_json::to_value(LoggedTicket { ticket, confirmation })?;
                Ok(ToolResult::success(name, output).with_data(data))
            }
            Err(e) => Ok(ToolResult::failure(name, e.to_string())),
        }
    }
}
