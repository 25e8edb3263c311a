//! Ticket Dispatch
//!
//! Contract for the maintenance system tickets are filed into, plus the
//! single-retry submission every safety-critical ticket goes through.

mod memory;

pub use memory::InMemoryTicketSink;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{IndustriaError, Result};
use crate::model::{MaintenanceTicket, TicketConfirmation};

/// Ticket sink (Strategy pattern)
///
/// Every call is an independent submission; there is no dedup contract.
#[async_trait]
pub trait TicketSink: Send + Sync {
    /// Persist or dispatch a ticket
    async fn submit(&self, ticket: &MaintenanceTicket) -> Result<TicketConfirmation>;

    /// Sink name
    fn name(&self) -> &str;
}

/// How hard to try before declaring a ticket lost
#[derive(Clone, Copy, Debug)]
pub struct TicketRetry {
    /// Wait before the second attempt
    pub backoff: Duration,
    /// Bound on each attempt
    pub attempt_timeout: Duration,
}

impl Default for TicketRetry {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

const MAX_ATTEMPTS: u32 = 2;

/// Submit once, and once more after `backoff` if the first attempt fails.
pub async fn submit_with_retry(
    sink: &dyn TicketSink,
    ticket: &MaintenanceTicket,
    retry: TicketRetry,
) -> Result<TicketConfirmation> {
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(retry.backoff).await;
        }

        let outcome = tokio::time::timeout(retry.attempt_timeout, sink.submit(ticket))
            .await
            .unwrap_or_else(|_| {
                Err(IndustriaError::Timeout {
                    operation: format!("ticket submission to {}", sink.name()),
                    elapsed: retry.attempt_timeout,
                })
            });

        match outcome {
            Ok(confirmation) => {
                tracing::info!(
                    machine_id = %ticket.machine_id,
                    priority = %ticket.priority,
                    attempt,
                    ticket_id = %confirmation.ticket_id,
                    "Ticket logged"
                );
                return Ok(confirmation);
            }
            Err(e) => {
                tracing::warn!(
                    machine_id = %ticket.machine_id,
                    attempt,
                    error = %e,
                    "Ticket submission failed"
                );
                last_error = e.to_string();
            }
        }
    }

    tracing::error!(machine_id = %ticket.machine_id, priority = %ticket.priority, "Ticket could not be logged");
    Err(IndustriaError::TicketRetryExhausted {
        machine_id: ticket.machine_id.clone(),
        attempts: MAX_ATTEMPTS,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TicketPriority;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` submissions, then delegates.
    struct FlakySink {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryTicketSink,
    }

    #[async_trait]
    impl TicketSink for FlakySink {
        async fn submit(&self, ticket: &MaintenanceTicket) -> Result<TicketConfirmation> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(IndustriaError::TicketSubmission("CMMS returned 503".into()));
            }
            self.inner.submit(ticket).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn fast() -> TicketRetry {
        TicketRetry {
            backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    fn ticket() -> MaintenanceTicket {
        MaintenanceTicket::new("CNC-01", TicketPriority::High, "overheating", "EMERGENCY STOP")
    }

    #[tokio::test]
    async fn test_retry_recovers_after_one_failure() {
        let sink = FlakySink { failures: 1, calls: AtomicU32::new(0), inner: InMemoryTicketSink::new() };
        let confirmation = submit_with_retry(&sink, &ticket(), fast()).await.unwrap();
        assert_eq!(confirmation.priority, TicketPriority::High);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.inner.tickets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_failure() {
        let sink = FlakySink { failures: 5, calls: AtomicU32::new(0), inner: InMemoryTicketSink::new() };
        let err = submit_with_retry(&sink, &ticket(), fast()).await.unwrap_err();
        assert!(matches!(err, IndustriaError::TicketRetryExhausted { attempts: 2, .. }));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }
}
