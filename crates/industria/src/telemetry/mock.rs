//! Simulated Telemetry
//!
//! Static demo fleet for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;

use super::TelemetryProvider;
use crate::error::{IndustriaError, Result};
use crate::model::{MachineReading, MachineStatus, VibrationLevel};

/// Telemetry provider backed by a fixed set of readings
pub struct MockTelemetryProvider {
    fleet: BTreeMap<String, MachineReading>,
}

impl Default for MockTelemetryProvider {
    fn default() -> Self {
        Self::demo()
    }
}

impl MockTelemetryProvider {
    /// Empty fleet
    pub fn empty() -> Self {
        Self {
            fleet: BTreeMap::new(),
        }
    }

    /// CNC-01 overheating, Pump-A idle and cool
    pub fn demo() -> Self {
        Self::empty()
            .with_machine(
                MachineReading::new("CNC-01", MachineStatus::Running, 105.0, VibrationLevel::Critical)
                    .with_alert("OVERHEATING"),
            )
            .with_machine(MachineReading::new(
                "Pump-A",
                MachineStatus::Idle,
                45.0,
                VibrationLevel::Normal,
            ))
    }

    #[must_use]
    pub fn with_machine(mut self, reading: MachineReading) -> Self {
        self.fleet.insert(reading.machine_id.clone(), reading);
        self
    }

    pub fn machine_ids(&self) -> Vec<&str> {
        self.fleet.keys().map(String::as_str).collect()
    }

    fn hint(&self) -> String {
        let quoted: Vec<String> = self.fleet.keys().map(|id| format!("'{id}'")).collect();
        match quoted.as_slice() {
            [] => "No machines are registered.".into(),
            [only] => format!("Try {only}."),
            [head @ .., last] => format!("Try {} or {last}.", head.join(", ")),
        }
    }
}

#[async_trait]
impl TelemetryProvider for MockTelemetryProvider {
    async fn get(&self, machine_id: &str) -> Result<MachineReading> {
        let mut reading = self
            .fleet
            .get(machine_id.trim())
            .cloned()
            .ok_or_else(|| IndustriaError::MachineNotFound {
                machine_id: machine_id.to_string(),
                hint: self.hint(),
            })?;

        reading.observed_at = Utc::now();
        Ok(reading)
    }

    fn name(&self) -> &str {
        "MockTelemetry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_fleet() {
        let telemetry = MockTelemetryProvider::demo();

        let cnc = telemetry.get("CNC-01").await.unwrap();
        assert!((cnc.temperature_c - 105.0).abs() < f64::EPSILON);
        assert_eq!(cnc.vibration, VibrationLevel::Critical);
        assert_eq!(cnc.alert.as_deref(), Some("OVERHEATING"));

        let pump = telemetry.get("Pump-A").await.unwrap();
        assert_eq!(pump.status, MachineStatus::Idle);
        assert!(pump.alert.is_none());
    }

    #[tokio::test]
    async fn test_unknown_machine() {
        let telemetry = MockTelemetryProvider::demo();
        let err = telemetry.get("Unknown-99").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Machine ID not found. Try 'CNC-01' or 'Pump-A'."
        );
    }
}
