//! Telemetry Lookup Tool
//!
//! `get_machine_telemetry`: current sensor readings for one machine.

use std::sync::Arc;

use agent_core::{
    AgentError, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
    tool::ParameterSchema,
};
use async_trait::async_trait;

use crate::capability::{Capability, CapabilityRequest};
use crate::telemetry::TelemetryProvider;

pub struct TelemetryLookupTool {
    telemetry: Arc<dyn TelemetryProvider>,
}

impl TelemetryLookupTool {
    pub fn new(telemetry: Arc<dyn TelemetryProvider>) -> Self {
        Self { telemetry }
    }
}

#[async_trait]
impl Tool for TelemetryLookupTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Capability::GetMachineTelemetry.name().into(),
            description: "Retrieve real-time sensor data (status, temperature in °C, vibration, alerts) for a machine.".into(),
            parameters: vec![ParameterSchema::required_string(
                "machine_id",
                "Machine identifier, e.g. 'CNC-01' or 'Pump-A'",
            )],
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let name = Capability::GetMachineTelemetry.name();
        let CapabilityRequest::GetMachineTelemetry { machine_id } = CapabilityRequest::parse(call)? else {
            return Err(AgentError::ToolValidation(format!("{} cannot serve {}", name, call.name)));
        };

        match self.telemetry.get(&machine_id).await {
            Ok(reading) => {
                if let Err(e) = reading.validate() {
                    tracing::warn!(machine_id = %machine_id, error = %e, "Discarding invalid reading");
                    return Ok(ToolResult::failure(name, e.to_string()));
                }
                let data = serde_json::to_value(&reading)?;
                Ok(ToolResult::success(name, serde_json::to_string_pretty(&data)?).with_data(data))
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(machine_id = %machine_id, "Telemetry lookup for unknown machine");
                Ok(ToolResult::failure(name, e.to_string()))
            }
            Err(e) => Err(AgentError::ToolExecution(e.to_string())),
        }
    }
}
