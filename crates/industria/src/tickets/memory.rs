//! In-memory ticket sink: records submissions and hands back the classic
//! confirmation line.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::TicketSink;
use crate::error::Result;
use crate::model::{MaintenanceTicket, TicketConfirmation, TicketPriority};

#[derive(Default)]
pub struct InMemoryTicketSink {
    log: Mutex<Vec<(MaintenanceTicket, TicketConfirmation)>>,
}

impl InMemoryTicketSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets in submission order
    pub async fn tickets(&self) -> Vec<MaintenanceTicket> {
        self.log.lock().await.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Number of tickets filed for a machine at a given priority
    pub async fn count(&self, machine_id: &str, priority: TicketPriority) -> usize {
        self.log
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t.machine_id == machine_id && t.priority == priority)
            .count()
    }
}

#[async_trait]
impl TicketSink for InMemoryTicketSink {
    async fn submit(&self, ticket: &MaintenanceTicket) -> Result<TicketConfirmation> {
        let confirmation = TicketConfirmation {
            ticket_id: uuid::Uuid::new_v4().to_string(),
            machine_id: ticket.machine_id.clone(),
            priority: ticket.priority,
            reference: format!(
                "✅ TICKET LOGGED: [{}] Priority: {} | Action: {}",
                ticket.machine_id, ticket.priority, ticket.action
            ),
        };
        self.log.lock().await.push((ticket.clone(), confirmation.clone()));
        Ok(confirmation)
    }

    fn name(&self) -> &str {
        "InMemoryTickets"
    }
}
