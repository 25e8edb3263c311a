//! Safety Policy
//!
//! Maps a reading to the action the maintenance manual requires. Pure and
//! total: invalid readings are rejected by the caller before they get here.
//!
//! ```text
//!   temperature_c        severity   ticket   emergency stop
//!   ─────────────────────────────────────────────────────────
//!   t <  80              NORMAL     -        no
//!   80 <= t <= 100       WARNING    MEDIUM   no
//!   t  > 100             CRITICAL   HIGH     yes
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{IndustriaError, Result};
use crate::model::{Directive, MachineReading, MaintenanceTicket, SeverityLevel};

/// Temperature bands, in °C
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyThresholds {
    /// Warning starts at this temperature (inclusive)
    pub warning_c: f64,
    /// Critical starts strictly above this temperature
    pub critical_above_c: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            warning_c: 80.0,
            critical_above_c: 100.0,
        }
    }
}

impl PolicyThresholds {
    pub fn new(warning_c: f64, critical_above_c: f64) -> Result<Self> {
        if !warning_c.is_finite() || !critical_above_c.is_finite() {
            return Err(IndustriaError::Config("thresholds must be finite".into()));
        }
        if warning_c > critical_above_c {
            return Err(IndustriaError::Config(format!(
                "warning threshold {warning_c}°C is above critical threshold {critical_above_c}°C"
            )));
        }
        Ok(Self {
            warning_c,
            critical_above_c,
        })
    }
}

/// Deterministic rule engine, independent of the reasoning engine
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyEngine {
    thresholds: PolicyThresholds,
}

impl PolicyEngine {
    pub const fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub const fn thresholds(&self) -> PolicyThresholds {
        self.thresholds
    }

    pub fn evaluate(&self, reading: &MachineReading) -> Directive {
        self.evaluate_temperature(reading.temperature_c)
    }

    pub fn evaluate_temperature(&self, temperature_c: f64) -> Directive {
        if temperature_c > self.thresholds.critical_above_c {
            Directive::CRITICAL
        } else if temperature_c >= self.thresholds.warning_c {
            Directive::WARNING
        } else {
            Directive::NORMAL
        }
    }

    /// Ticket the session files on its own when the engine did not.
    pub fn mandated_ticket(
        &self,
        reading: &MachineReading,
        directive: &Directive,
    ) -> Option<MaintenanceTicket> {
        let priority = directive.ticket_priority.filter(|_| directive.requires_ticket)?;

        let mut issue = match directive.severity {
            SeverityLevel::Critical => format!(
                "Temperature {:.1}°C above critical limit of {:.0}°C",
                reading.temperature_c, self.thresholds.critical_above_c
            ),
            _ => format!(
                "Temperature {:.1}°C in warning band ({:.0}-{:.0}°C)",
                reading.temperature_c, self.thresholds.warning_c, self.thresholds.critical_above_c
            ),
        };
        if let Some(alert) = &reading.alert {
            issue.push_str(&format!("; controller alert {alert}"));
        }

        let action = if directive.requires_emergency_stop {
            "EMERGENCY STOP. Lock out and inspect cooling before restart"
        } else {
            "Schedule inspection of cooling and lubrication"
        };

        Some(MaintenanceTicket::new(
            reading.machine_id.clone(),
            priority,
            issue,
            action,
        ))
    }

    /// Manual text embedded in the system prompt
    pub fn manual(&self) -> String {
        format!(
            "MANUAL:\n\
             1. Normal: Temp < {w:.0}C.\n\
             2. Warning: Temp {w:.0}-{c:.0}C -> Log MEDIUM ticket.\n\
             3. CRITICAL: Temp > {c:.0}C -> Log HIGH ticket + EMERGENCY STOP.",
            w = self.thresholds.warning_c,
            c = self.thresholds.critical_above_c,
        )
    }
}
