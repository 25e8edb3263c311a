//! Agent Session
//!
//! One operator conversation. Each turn runs the bounded reasoning loop,
//! then applies the safety policy to every reading fetched during the turn
//! regardless of what the engine concluded, files any ticket the engine
//! skipped, and only then commits the exchange to the transcript.
//!
//! ```text
//!  Idle ──utterance──▶ AwaitingReasoningResult ──▶ PolicyCheck ──▶ Responding ──▶ Idle
//!                      (engine calls + capability
//!                       invocations, bounded)
//! ```

use std::sync::Arc;

use agent_core::{Agent, AgentError, Invocation, LlmProvider, Message, Session, SessionId, ToolCall};
use serde::Serialize;

use crate::capability::Capability;
use crate::config::IndustriaConfig;
use crate::error::Result;
use crate::model::{Directive, MachineReading, SeverityLevel, TicketConfirmation, TicketPriority};
use crate::policy::PolicyEngine;
use crate::surface::{Alert, DialogueSurface};
use crate::svckit::{self, LoggedTicket};
use crate::telemetry::TelemetryProvider;
use crate::tickets::{TicketRetry, TicketSink, submit_with_retry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    /// Engine calls and the capability invocations they request
    AwaitingReasoningResult,
    PolicyCheck,
    Responding,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    /// Engine or dispatch trouble; the turn still finished
    Degraded { reason: String },
    /// A mandated ticket could not be logged
    Failed { reason: String },
}

/// Policy verdict for one machine seen this turn
#[derive(Clone, Debug, Serialize)]
pub struct PolicyFinding {
    pub reading: MachineReading,
    pub directive: Directive,
    /// Ticket satisfying the directive, whoever filed it
    pub ticket: Option<TicketConfirmation>,
    /// Filed by the session because the engine did not
    pub enforced: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TurnReport {
    pub reply: String,
    pub status: TurnStatus,
    pub severity: Option<SeverityLevel>,
    pub findings: Vec<PolicyFinding>,
    pub tickets: Vec<TicketConfirmation>,
    pub alerts: Vec<Alert>,
}

/// What the engine's capability calls produced this turn
#[derive(Default)]
struct Observed {
    /// Latest reading per machine, in first-seen order
    readings: Vec<MachineReading>,
    /// Tickets the engine filed successfully
    tickets: Vec<TicketConfirmation>,
    /// Tickets the engine asked for that the sink never accepted
    lost_tickets: Vec<LostTicket>,
}

struct LostTicket {
    machine_id: String,
    priority: Option<TicketPriority>,
    reason: String,
}

impl Observed {
    fn collect(invocations: &[Invocation]) -> Self {
        let mut observed = Self::default();

        for Invocation { call, result } in invocations {
            if !result.success && Capability::from_name(&call.name) == Some(Capability::LogMaintenanceTicket) {
                observed.record_lost_ticket(call, &result.output);
                continue;
            }
            let Some(data) = result.data.clone().filter(|_| result.success) else {
                continue;
            };
            match Capability::from_name(&call.name) {
                Some(Capability::GetMachineTelemetry) => {
                    match serde_json::from_value::<MachineReading>(data) {
                        Ok(reading) => observed.record_reading(reading),
                        Err(e) => tracing::error!(error = %e, "Unreadable telemetry payload"),
                    }
                }
                Some(Capability::LogMaintenanceTicket) => {
                    match serde_json::from_value::<LoggedTicket>(data) {
                        Ok(logged) => observed.tickets.push(logged.confirmation),
                        Err(e) => tracing::error!(error = %e, "Unreadable ticket payload"),
                    }
                }
                None => {}
            }
        }

        observed
    }

    fn record_lost_ticket(&mut self, call: &ToolCall, reason: &str) {
        let machine_id = call.str_arg("machine_id").unwrap_or_default().trim().to_string();
        tracing::error!(machine_id = %machine_id, reason, "Engine-requested ticket was not logged");
        self.lost_tickets.push(LostTicket {
            machine_id,
            priority: call.str_arg("priority").and_then(|p| p.trim().parse().ok()),
            reason: reason.to_string(),
        });
    }

    fn record_reading(&mut self, reading: MachineReading) {
        match self
            .readings
            .iter_mut()
            .find(|r| r.machine_id == reading.machine_id)
        {
            Some(existing) => *existing = reading,
            None => self.readings.push(reading),
        }
    }
}

pub struct MaintenanceSession {
    session: Session,
    agent: Arc<Agent>,
    policy: PolicyEngine,
    sink: Arc<dyn TicketSink>,
    retry: TicketRetry,
    state: TurnState,
}

impl MaintenanceSession {
    pub fn new(
        agent: Arc<Agent>,
        policy: PolicyEngine,
        sink: Arc<dyn TicketSink>,
        retry: TicketRetry,
    ) -> Self {
        Self {
            session: Session::new(),
            agent,
            policy,
            sink,
            retry,
            state: TurnState::Idle,
        }
    }

    pub const fn id(&self) -> &SessionId {
        &self.session.id
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Committed turns in replay order
    pub fn transcript(&self) -> &[Message] {
        self.session.conversation().messages()
    }

    pub const fn state(&self) -> TurnState {
        self.state
    }

    pub fn end(&mut self) {
        self.session.end();
        tracing::info!(session = %self.session.id, turns = self.session.message_count() / 2, "Session ended");
    }

    /// Serve utterances until the surface runs dry. Returns the turn count.
    pub async fn run(&mut self, surface: &mut dyn DialogueSurface) -> usize {
        let mut turns = 0;
        while let Some(utterance) = surface.next_utterance().await {
            self.handle(&utterance, surface).await;
            turns += 1;
        }
        self.end();
        turns
    }

    /// Process one utterance through to a committed response.
    ///
    /// Never fails: engine, dispatch and ticket errors all end up in the
    /// report and in the assistant turn. Dropping the future before it
    /// resolves leaves the transcript untouched.
    pub async fn handle(&mut self, utterance: &str, surface: &mut dyn DialogueSurface) -> TurnReport {
        if self.state != TurnState::Idle {
            tracing::warn!(session = %self.session.id, state = ?self.state, "Previous turn was abandoned");
        }

        self.state = TurnState::AwaitingReasoningResult;
        let outcome = self
            .agent
            .run_turn(self.session.conversation().context_window(), utterance)
            .await;

        self.state = TurnState::PolicyCheck;
        let observed = Observed::collect(&outcome.invocations);
        let (findings, failures) = self.enforce(&observed).await;

        self.state = TurnState::Responding;
        let mut tickets = observed.tickets;
        tickets.extend(
            findings
                .iter()
                .filter(|f| f.enforced)
                .filter_map(|f| f.ticket.clone()),
        );

        let status = if !failures.is_empty() {
            TurnStatus::Failed {
                reason: failures.join("; "),
            }
        } else if let Err(e) = &outcome.reply {
            TurnStatus::Degraded {
                reason: e.to_string(),
            }
        } else {
            TurnStatus::Completed
        };

        let reply = compose_reply(&outcome.reply, &findings, &tickets, &failures);
        let severity = findings.iter().map(|f| f.directive.severity).max();

        let user_turn = Message::user(utterance);
        let assistant_turn = Message::assistant(&reply);
        surface.render(&user_turn);
        surface.render(&assistant_turn);
        self.session.commit_exchange(user_turn, assistant_turn);

        let mut alerts = Vec::new();
        for finding in findings
            .iter()
            .filter(|f| f.directive.severity == SeverityLevel::Critical)
        {
            surface.emit_alert(SeverityLevel::Critical, &finding.reading.machine_id);
            alerts.push(Alert {
                severity: SeverityLevel::Critical,
                machine_id: finding.reading.machine_id.clone(),
            });
        }

        tracing::info!(
            session = %self.session.id,
            invocations = outcome.invocations.len(),
            tickets = tickets.len(),
            severity = ?severity,
            status = ?status,
            "Turn complete"
        );

        self.state = TurnState::Idle;
        TurnReport {
            reply,
            status,
            severity,
            findings,
            tickets,
            alerts,
        }
    }

    /// PolicyCheck: evaluate every reading and file what the engine missed.
    async fn enforce(&self, observed: &Observed) -> (Vec<PolicyFinding>, Vec<String>) {
        let mut findings = Vec::new();
        let mut failures: Vec<String> =
            observed.lost_tickets.iter().map(|lost| lost.reason.clone()).collect();

        for reading in &observed.readings {
            if let Err(e) = reading.validate() {
                tracing::error!(machine_id = %reading.machine_id, error = %e, "Reading cannot be policed");
                failures.push(e.to_string());
                continue;
            }

            let directive = self.policy.evaluate(reading);
            tracing::info!(
                machine_id = %reading.machine_id,
                temperature_c = reading.temperature_c,
                severity = %directive.severity,
                "Policy evaluated"
            );

            let mut finding = PolicyFinding {
                reading: reading.clone(),
                directive,
                ticket: None,
                enforced: false,
            };

            if directive.requires_ticket {
                finding.ticket = observed
                    .tickets
                    .iter()
                    .find(|c| {
                        c.machine_id == reading.machine_id
                            && Some(c.priority) == directive.ticket_priority
                    })
                    .cloned();

                let already_lost = observed.lost_tickets.iter().any(|lost| {
                    lost.machine_id == reading.machine_id && lost.priority == directive.ticket_priority
                });

                if already_lost {
                    // The sink refused this exact ticket twice this turn.
                    tracing::error!(
                        machine_id = %reading.machine_id,
                        "Mandated ticket already exhausted its retry; not resubmitting"
                    );
                } else if finding.ticket.is_none() {
                    if let Some(ticket) = self.policy.mandated_ticket(reading, &directive) {
                        tracing::warn!(
                            machine_id = %reading.machine_id,
                            priority = %ticket.priority,
                            "Engine did not log the mandated ticket; filing it"
                        );
                        match submit_with_retry(self.sink.as_ref(), &ticket, self.retry).await {
                            Ok(confirmation) => {
                                finding.ticket = Some(confirmation);
                                finding.enforced = true;
                            }
                            Err(e) => failures.push(e.to_string()),
                        }
                    }
                }
            }

            findings.push(finding);
        }

        (findings, failures)
    }
}

fn compose_reply(
    reply: &std::result::Result<String, AgentError>,
    findings: &[PolicyFinding],
    tickets: &[TicketConfirmation],
    failures: &[String],
) -> String {
    let mut text = match reply {
        Ok(answer) => answer.clone(),
        Err(e) => fallback_reply(e, findings),
    };

    let mut notes: Vec<String> = tickets.iter().map(|t| t.reference.clone()).collect();
    for finding in findings.iter().filter(|f| f.directive.requires_emergency_stop) {
        notes.push(format!(
            "🛑 EMERGENCY STOP required for {} ({:.1}°C).",
            finding.reading.machine_id, finding.reading.temperature_c
        ));
    }
    for failure in failures {
        notes.push(format!(
            "❌ {failure}. The condition is NOT logged; escalate to the shift supervisor."
        ));
    }

    if !notes.is_empty() {
        text.push_str("\n\n---\n");
        text.push_str(&notes.join("\n"));
    }
    text
}

/// Local answer used when the engine never produced one
fn fallback_reply(error: &AgentError, findings: &[PolicyFinding]) -> String {
    let mut text = format!("⚠️ {}", error.user_message());
    if !findings.is_empty() {
        text.push_str("\n\nTelemetry retrieved before the interruption:");
        for finding in findings {
            text.push_str(&format!(
                "\n- {} → {}",
                finding.reading.summary(),
                finding.directive.severity
            ));
        }
    }
    text
}

/// Shared collaborators; hands out one [`MaintenanceSession`] per conversation.
pub struct SessionFactory {
    agent: Arc<Agent>,
    policy: PolicyEngine,
    sink: Arc<dyn TicketSink>,
    retry: TicketRetry,
}

impl SessionFactory {
    pub fn new(
        config: &IndustriaConfig,
        provider: Arc<dyn LlmProvider>,
        telemetry: Arc<dyn TelemetryProvider>,
        sink: Arc<dyn TicketSink>,
    ) -> Result<Self> {
        let policy = PolicyEngine::new(config.thresholds);
        let retry = config.ticket_retry();
        let tools = svckit::registry(telemetry, sink.clone(), retry)?;
        let agent = Agent::new(
            provider,
            Arc::new(tools),
            config.agent_config(crate::system_prompt(&policy)),
        );

        Ok(Self {
            agent: Arc::new(agent),
            policy,
            sink,
            retry,
        })
    }

    pub fn session(&self) -> MaintenanceSession {
        MaintenanceSession::new(self.agent.clone(), self.policy, self.sink.clone(), self.retry)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndustriaError;
    use crate::model::{MaintenanceTicket, TicketPriority};
    use crate::surface::RecordingSurface;
    use crate::telemetry::MockTelemetryProvider;
    use crate::tickets::InMemoryTicketSink;
    use agent_core::provider::{Completion, GenerationOptions, ModelInfo, ProviderInfo};
    use agent_core::{Role, ToolCall, ToolSchema};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    enum Step {
        Reply(agent_core::Result<Completion>),
        Hang,
    }

    struct ScriptedProvider {
        script: Mutex<VecDeque<Step>>,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(steps.into()) })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> agent_core::Result<ProviderInfo> {
            Ok(ProviderInfo { name: "scripted".into(), models: vec![], supports_tools: true })
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(reply)) => reply,
                Some(Step::Hang) => std::future::pending().await,
                None => Err(AgentError::ProviderUnavailable("script exhausted".into())),
            }
        }

        async fn list_models(&self) -> agent_core::Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    /// Fails the first `failures` submissions, then records like the in-memory sink.
    struct FlakySink {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryTicketSink,
    }

    impl FlakySink {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self { failures, calls: AtomicU32::new(0), inner: InMemoryTicketSink::new() })
        }
    }

    #[async_trait]
    impl TicketSink for FlakySink {
        async fn submit(&self, ticket: &MaintenanceTicket) -> Result<TicketConfirmation> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(IndustriaError::TicketSubmission("maintenance system offline".into()));
            }
            self.inner.submit(ticket).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn config() -> IndustriaConfig {
        IndustriaConfig {
            provider_timeout: Duration::from_millis(200),
            ticket_retry_backoff: Duration::from_millis(1),
            ..IndustriaConfig::default()
        }
    }

    fn session_with(steps: Vec<Step>, sink: Arc<dyn TicketSink>) -> MaintenanceSession {
        SessionFactory::new(
            &config(),
            ScriptedProvider::new(steps),
            Arc::new(MockTelemetryProvider::demo()),
            sink,
        )
        .unwrap()
        .session()
    }

    fn text(s: &str) -> Step {
        Step::Reply(Ok(Completion::text(s)))
    }

    fn fetch(machine_id: &str) -> Step {
        Step::Reply(Ok(Completion::calls(vec![
            ToolCall::new("get_machine_telemetry").arg("machine_id", machine_id),
        ])))
    }

    fn log_ticket(machine_id: &str, priority: &str) -> Step {
        Step::Reply(Ok(Completion::calls(vec![
            ToolCall::new("log_maintenance_ticket")
                .arg("machine_id", machine_id)
                .arg("priority", priority)
                .arg("issue", "Overheating")
                .arg("action", "Emergency stop"),
        ])))
    }

    #[tokio::test]
    async fn critical_reading_gets_ticket_even_when_engine_forgets() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![fetch("CNC-01"), text("CNC-01 is running hot.")],
            sink.clone(),
        );
        let mut surface = RecordingSurface::new();

        let report = session.handle("Check status of CNC-01", &mut surface).await;

        assert_eq!(report.status, TurnStatus::Completed);
        assert_eq!(report.severity, Some(SeverityLevel::Critical));
        assert_eq!(report.findings[0].directive, Directive::CRITICAL);
        assert!(report.findings[0].enforced);
        assert_eq!(sink.count("CNC-01", TicketPriority::High).await, 1);

        assert!(report.reply.starts_with("CNC-01 is running hot."));
        assert!(report.reply.contains("✅ TICKET LOGGED: [CNC-01] Priority: HIGH"));
        assert!(report.reply.contains("EMERGENCY STOP required for CNC-01"));

        assert_eq!(surface.alerts.len(), 1);
        assert_eq!(surface.alerts[0].severity, SeverityLevel::Critical);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn engine_logged_ticket_is_not_duplicated() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![fetch("CNC-01"), log_ticket("CNC-01", "HIGH"), text("Logged a HIGH ticket.")],
            sink.clone(),
        );

        let report = session.handle("Check CNC-01", &mut RecordingSurface::new()).await;

        assert_eq!(sink.count("CNC-01", TicketPriority::High).await, 1);
        assert!(!report.findings[0].enforced);
        assert!(report.findings[0].ticket.is_some());
        assert_eq!(report.tickets.len(), 1);
    }

    #[tokio::test]
    async fn wrong_priority_from_engine_is_corrected() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![fetch("CNC-01"), log_ticket("CNC-01", "LOW"), text("Logged it.")],
            sink.clone(),
        );

        let report = session.handle("Check CNC-01", &mut RecordingSurface::new()).await;

        assert_eq!(sink.count("CNC-01", TicketPriority::Low).await, 1);
        assert_eq!(sink.count("CNC-01", TicketPriority::High).await, 1);
        assert!(report.findings[0].enforced);
        assert_eq!(report.tickets.len(), 2);
    }

    #[tokio::test]
    async fn normal_reading_files_nothing() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![fetch("Pump-A"), text("Pump-A is idle at 45°C. All normal.")],
            sink.clone(),
        );
        let mut surface = RecordingSurface::new();

        let report = session.handle("How is Pump-A?", &mut surface).await;

        assert_eq!(report.findings[0].directive, Directive::NORMAL);
        assert!(sink.tickets().await.is_empty());
        assert_eq!(report.reply, "Pump-A is idle at 45°C. All normal.");
        assert!(surface.alerts.is_empty());
    }

    #[tokio::test]
    async fn unknown_machine_skips_policy() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![
                fetch("Unknown-99"),
                text("I could not find Unknown-99. Try 'CNC-01' or 'Pump-A'."),
            ],
            sink.clone(),
        );

        let report = session.handle("Check Unknown-99", &mut RecordingSurface::new()).await;

        assert_eq!(report.status, TurnStatus::Completed);
        assert!(report.findings.is_empty());
        assert_eq!(report.severity, None);
        assert!(sink.tickets().await.is_empty());
        assert!(report.reply.contains("could not find Unknown-99"));
    }

    #[tokio::test]
    async fn ticket_retry_succeeds_on_second_attempt() {
        let sink = FlakySink::new(1);
        let mut session = session_with(vec![fetch("CNC-01"), text("Hot.")], sink.clone());

        let report = session.handle("Check CNC-01", &mut RecordingSurface::new()).await;

        assert_eq!(report.status, TurnStatus::Completed);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        let last = session.transcript().last().unwrap();
        assert!(last.content.contains("✅ TICKET LOGGED: [CNC-01]"));
    }

    #[tokio::test]
    async fn ticket_retry_exhausted_fails_the_turn() {
        let sink = FlakySink::new(2);
        let mut session = session_with(vec![fetch("CNC-01"), text("Hot.")], sink.clone());
        let mut surface = RecordingSurface::new();

        let report = session.handle("Check CNC-01", &mut surface).await;

        assert!(matches!(report.status, TurnStatus::Failed { .. }));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert!(report.reply.contains("NOT logged"));
        // still a critical condition: operator is alerted and the turn is recorded
        assert_eq!(surface.alerts.len(), 1);
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn engine_ticket_lost_after_retry_fails_the_turn() {
        let sink = FlakySink::new(10);
        let mut session = session_with(
            vec![log_ticket("Pump-A", "LOW"), text("Ticket logged for Pump-A.")],
            sink.clone(),
        );

        let report = session.handle("Log a LOW ticket for Pump-A", &mut RecordingSurface::new()).await;

        assert!(matches!(report.status, TurnStatus::Failed { .. }));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert!(report.reply.starts_with("Ticket logged for Pump-A."));
        assert!(report.reply.contains("❌"));
        assert!(report.reply.contains("NOT logged"));
        assert!(report.tickets.is_empty());
    }

    #[tokio::test]
    async fn mandated_ticket_lost_by_engine_is_not_resubmitted() {
        let sink = FlakySink::new(10);
        let mut session = session_with(
            vec![fetch("CNC-01"), log_ticket("CNC-01", "HIGH"), text("Logged a HIGH ticket.")],
            sink.clone(),
        );
        let mut surface = RecordingSurface::new();

        let report = session.handle("Check CNC-01", &mut surface).await;

        let TurnStatus::Failed { reason } = &report.status else {
            panic!("expected failed turn");
        };
        assert!(!reason.contains("; "), "failure reported once: {reason}");
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert!(report.findings[0].ticket.is_none());
        assert!(!report.findings[0].enforced);
        assert_eq!(surface.alerts.len(), 1);
    }

    #[tokio::test]
    async fn direct_answer_is_returned_verbatim() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let answer = "I monitor CNC-01 and Pump-A. Ask me about either.";
        let mut session = session_with(vec![text(answer)], sink.clone());

        let report = session.handle("What can you do?", &mut RecordingSurface::new()).await;

        assert_eq!(report.reply, answer);
        assert!(report.findings.is_empty());
        assert!(sink.tickets().await.is_empty());
    }

    #[tokio::test]
    async fn engine_failure_still_enforces_policy() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![
                fetch("CNC-01"),
                Step::Reply(Err(AgentError::ProviderUnavailable("connection reset".into()))),
            ],
            sink.clone(),
        );
        let mut surface = RecordingSurface::new();

        let report = session.handle("Check CNC-01", &mut surface).await;

        assert!(matches!(report.status, TurnStatus::Degraded { .. }));
        assert_eq!(sink.count("CNC-01", TicketPriority::High).await, 1);
        assert!(report.reply.starts_with("⚠️"));
        assert!(report.reply.contains("CNC-01: running, 105.0°C"));
        assert_eq!(surface.alerts.len(), 1);
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn unknown_capability_degrades_turn() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(
            vec![Step::Reply(Ok(Completion::calls(vec![ToolCall::new("shutdown_plant")])))],
            sink,
        );

        let report = session.handle("Shut it all down", &mut RecordingSurface::new()).await;

        let TurnStatus::Degraded { reason } = report.status else {
            panic!("expected degraded turn");
        };
        assert!(reason.contains("shutdown_plant"));
        assert!(report.reply.contains("not available"));
    }

    #[tokio::test]
    async fn engine_timeout_degrades_turn() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(vec![Step::Hang], sink);

        let report = session.handle("Check CNC-01", &mut RecordingSurface::new()).await;

        let TurnStatus::Degraded { reason } = report.status else {
            panic!("expected degraded turn");
        };
        assert!(reason.contains("timed out"));
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn abandoned_turn_commits_nothing() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(vec![Step::Hang, text("Back online.")], sink);
        let mut surface = RecordingSurface::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            session.handle("Check CNC-01", &mut surface),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), TurnState::AwaitingReasoningResult);

        let report = session.handle("Hello?", &mut surface).await;
        assert_eq!(report.reply, "Back online.");
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0].content, "Hello?");
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn run_serves_until_surface_is_exhausted() {
        let sink = Arc::new(InMemoryTicketSink::new());
        let mut session = session_with(vec![text("Hi."), text("Bye.")], sink);
        let mut surface = RecordingSurface::with_utterances(["hello", "goodbye"]);

        let turns = session.run(&mut surface).await;

        assert_eq!(turns, 2);
        assert_eq!(surface.turns.len(), 4);
        assert_eq!(surface.turns[0].role, Role::User);
        assert_eq!(surface.turns[3].content, "Bye.");
        assert!(!session.session().active);
    }
}
