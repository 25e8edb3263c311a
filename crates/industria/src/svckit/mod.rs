//! Service Kit - Agent Tools
//!
//! `agent_core::Tool` implementations for the two capabilities, and the
//! registry that exposes them to the reasoning engine.

mod telemetry_lookup;
mod ticket_logger;

pub use telemetry_lookup::TelemetryLookupTool;
pub use ticket_logger::{LoggedTicket, TicketLoggerTool};

use std::sync::Arc;

use agent_core::ToolRegistry;

use crate::telemetry::TelemetryProvider;
use crate::tickets::{TicketRetry, TicketSink};

/// Registry holding exactly the Industria capabilities
pub fn registry(
    telemetry: Arc<dyn TelemetryProvider>,
    sink: Arc<dyn TicketSink>,
    retry: TicketRetry,
) -> agent_core::Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    tools.register(TelemetryLookupTool::new(telemetry))?;
    tools.register(TicketLoggerTool::new(sink, retry))?;
    Ok(tools)
}
