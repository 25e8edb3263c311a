//! Telemetry Integration
//!
//! Contract for the sensor gateway the agent reads from.

mod mock;

pub use mock::MockTelemetryProvider;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::MachineReading;

/// Telemetry source (Strategy pattern)
///
/// Implementations must be safe to call from many sessions at once and
/// must return [`IndustriaError::MachineNotFound`](crate::IndustriaError::MachineNotFound)
/// rather than a partially populated reading for unknown machines.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Current reading for one machine
    async fn get(&self, machine_id: &str) -> Result<MachineReading>;

    /// Source name
    fn name(&self) -> &str;
}
