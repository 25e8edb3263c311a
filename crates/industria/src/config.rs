//! Configuration
//!
//! Read from the environment (a `.env` file is loaded by the binaries).
//! Malformed values fall back to their defaults with a warning.

use std::str::FromStr;
use std::time::Duration;

use agent_core::provider::GenerationOptions;
use agent_core::AgentConfig;

use crate::error::Result;
use crate::policy::PolicyThresholds;
use crate::tickets::TicketRetry;

#[derive(Clone, Debug)]
pub struct IndustriaConfig {
    pub model: String,
    pub max_iterations: usize,
    pub max_tool_calls: usize,
    pub provider_timeout: Duration,
    pub tool_timeout: Duration,
    pub ticket_retry_backoff: Duration,
    pub thresholds: PolicyThresholds,
    /// Hosted sessions with no activity for this long are ended
    pub session_idle_timeout: Duration,
}

impl Default for IndustriaConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            max_iterations: 6,
            max_tool_calls: 8,
            provider_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(10),
            ticket_retry_backoff: Duration::from_millis(500),
            thresholds: PolicyThresholds::default(),
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl IndustriaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let thresholds = PolicyThresholds::new(
            parse_or(&lookup, "INDUSTRIA_WARNING_C", defaults.thresholds.warning_c),
            parse_or(&lookup, "INDUSTRIA_CRITICAL_C", defaults.thresholds.critical_above_c),
        )?;

        Ok(Self {
            model: lookup("INDUSTRIA_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model),
            max_iterations: parse_or(&lookup, "INDUSTRIA_MAX_ITERATIONS", defaults.max_iterations)
                .max(1),
            max_tool_calls: parse_or(&lookup, "INDUSTRIA_MAX_TOOL_CALLS", defaults.max_tool_calls),
            provider_timeout: Duration::from_secs(parse_or(
                &lookup,
                "INDUSTRIA_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout.as_secs(),
            )),
            tool_timeout: Duration::from_secs(parse_or(
                &lookup,
                "INDUSTRIA_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )),
            ticket_retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "INDUSTRIA_TICKET_RETRY_BACKOFF_MS",
                u64::try_from(defaults.ticket_retry_backoff.as_millis()).unwrap_or(500),
            )),
            thresholds,
            session_idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "INDUSTRIA_SESSION_IDLE_SECS",
                defaults.session_idle_timeout.as_secs(),
            )),
        })
    }

    /// Agent loop settings for a given system prompt
    pub fn agent_config(&self, system_prompt: String) -> AgentConfig {
        AgentConfig {
            system_prompt,
            max_iterations: self.max_iterations,
            max_tool_calls: self.max_tool_calls,
            generation: GenerationOptions {
                model: self.model.clone(),
                ..GenerationOptions::default()
            },
            inject_tool_descriptions: true,
            provider_timeout: self.provider_timeout,
            tool_timeout: self.tool_timeout,
        }
    }

    /// Ticket retry must finish inside one tool-call bound: two attempts
    /// plus the backoff.
    pub fn ticket_retry(&self) -> TicketRetry {
        let budget = self.tool_timeout.saturating_sub(self.ticket_retry_backoff);
        TicketRetry {
            backoff: self.ticket_retry_backoff,
            attempt_timeout: (budget / 2).max(Duration::from_millis(100)),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, ?default, "Ignoring malformed setting");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IndustriaConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.thresholds, PolicyThresholds::default());
    }

    #[test]
    fn test_overrides_and_malformed_values() {
        let config = IndustriaConfig::from_lookup(lookup(&[
            ("INDUSTRIA_MODEL", "qwen2.5"),
            ("INDUSTRIA_MAX_ITERATIONS", "not-a-number"),
            ("INDUSTRIA_TOOL_TIMEOUT_SECS", "3"),
            ("INDUSTRIA_WARNING_C", "75"),
            ("INDUSTRIA_SESSION_IDLE_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.tool_timeout, Duration::from_secs(3));
        assert!((config.thresholds.warning_c - 75.0).abs() < f64::EPSILON);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = IndustriaConfig::from_lookup(lookup(&[
            ("INDUSTRIA_WARNING_C", "120"),
            ("INDUSTRIA_CRITICAL_C", "100"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_ticket_retry_fits_tool_timeout() {
        let config = IndustriaConfig::default();
        let retry = config.ticket_retry();
        assert!(retry.backoff + retry.attempt_timeout * 2 <= config.tool_timeout);
    }
}
