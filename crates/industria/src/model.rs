//! Domain Models
//!
//! Machine readings, derived severity, maintenance tickets and the policy
//! verdict that ties them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{IndustriaError, Result};

/// Operating state reported by the machine controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Running,
    Idle,
    Unknown,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Idle => write!(f, "idle"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Vibration band from the accelerometer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrationLevel {
    Normal,
    Elevated,
    Critical,
}

impl fmt::Display for VibrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Elevated => write!(f, "elevated"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Snapshot of one machine's state. Built fresh per query, never cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineReading {
    pub machine_id: String,
    pub status: MachineStatus,
    pub temperature_c: f64,
    pub vibration: VibrationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl MachineReading {
    pub fn new(
        machine_id: impl Into<String>,
        status: MachineStatus,
        temperature_c: f64,
        vibration: VibrationLevel,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            status,
            temperature_c,
            vibration,
            alert: None,
            observed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_alert(mut self, alert: impl Into<String>) -> Self {
        self.alert = Some(alert.into());
        self
    }

    /// Reject readings the policy engine must never see.
    pub fn validate(&self) -> Result<()> {
        if self.machine_id.trim().is_empty() {
            return Err(IndustriaError::InvalidReading {
                machine_id: self.machine_id.clone(),
                reason: "empty machine id".into(),
            });
        }
        if !self.temperature_c.is_finite() {
            return Err(IndustriaError::InvalidReading {
                machine_id: self.machine_id.clone(),
                reason: format!("temperature {} is not a finite number", self.temperature_c),
            });
        }
        Ok(())
    }

    /// One-line operator summary
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {}, {:.1}°C, vibration {}",
            self.machine_id, self.status, self.temperature_c, self.vibration
        );
        if let Some(alert) = &self.alert {
            line.push_str(&format!(", alert {alert}"));
        }
        line
    }
}

/// Derived, ordered severity. Recomputed on every evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Request to act on a machine. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTicket {
    pub machine_id: String,
    pub priority: TicketPriority,
    pub issue: String,
    pub action: String,
}

impl MaintenanceTicket {
    pub fn new(
        machine_id: impl Into<String>,
        priority: TicketPriority,
        issue: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            priority,
            issue: issue.into(),
            action: action.into(),
        }
    }
}

/// Receipt handed back by a ticket sink
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketConfirmation {
    pub ticket_id: String,
    pub machine_id: String,
    pub priority: TicketPriority,
    pub reference: String,
}

/// The policy engine's deterministic verdict for one reading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub severity: SeverityLevel,
    pub requires_ticket: bool,
    pub requires_emergency_stop: bool,
    pub ticket_priority: Option<TicketPriority>,
}

impl Directive {
    pub const NORMAL: Self = Self {
        severity: SeverityLevel::Normal,
        requires_ticket: false,
        requires_emergency_stop: false,
        ticket_priority: None,
    };

    pub const WARNING: Self = Self {
        severity: SeverityLevel::Warning,
        requires_ticket: true,
        requires_emergency_stop: false,
        ticket_priority: Some(TicketPriority::Medium),
    };

    pub const CRITICAL: Self = Self {
        severity: SeverityLevel::Critical,
        requires_ticket: true,
        requires_emergency_stop: true,
        ticket_priority: Some(TicketPriority::High),
    };
}
