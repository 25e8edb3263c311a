//! Reasoning Loop
//!
//! Explicit, bounded version of the ReAct (Reason + Act) cycle: ask the
//! engine, run any capabilities it requests, feed the results back, and stop
//! when it answers in plain text or a guard trips.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System policy text
    pub system_prompt: String,

    /// Maximum engine calls per turn
    pub max_iterations: usize,

    /// Maximum capability invocations per turn
    pub max_tool_calls: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,

    /// Bound on a single engine call
    pub provider_timeout: Duration,

    /// Bound on a single capability invocation
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 6,
            max_tool_calls: 8,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
            provider_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// One capability invocation performed during a turn
#[derive(Clone, Debug)]
pub struct Invocation {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Everything a turn produced, whether or not the engine finished.
///
/// `invocations` is populated even when `reply` is an error so callers can
/// still act on capability results obtained before the failure.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: Result<String>,
    pub invocations: Vec<Invocation>,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run one turn: `history` is the committed transcript, `utterance` the
    /// new operator input. Nothing is written back to `history`.
    pub async fn run_turn(&self, history: &[Message], utterance: &str) -> TurnOutcome {
        let mut scratch = Vec::with_capacity(history.len() + 2);
        scratch.push(Message::system(self.build_system_prompt()));
        scratch.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        scratch.push(Message::user(utterance));

        let schemas = self.tools.schemas();
        let mut invocations = Vec::new();
        let reply = self.drive(&mut scratch, &schemas, &mut invocations).await;

        if let Err(e) = &reply {
            tracing::warn!(error = %e, invocations = invocations.len(), "Turn ended without a final answer");
        }

        TurnOutcome { reply, invocations }
    }

    async fn drive(
        &self,
        scratch: &mut Vec<Message>,
        schemas: &[ToolSchema],
        invocations: &mut Vec<Invocation>,
    ) -> Result<String> {
        for iteration in 1..=self.config.max_iterations {
            let completion = self.call_engine(scratch, schemas).await?;
            let calls = parse_tool_calls(&completion);

            if calls.is_empty() {
                tracing::debug!(iteration, "Engine returned final answer");
                return Ok(completion.content);
            }

            tracing::debug!(iteration, requested = calls.len(), "Engine requested tools");
            scratch.push(Message::assistant(assistant_echo(&completion, &calls)));

            for mut call in calls {
                if invocations.len() >= self.config.max_tool_calls {
                    return Err(AgentError::MaxToolCalls(self.config.max_tool_calls));
                }
                if call.id.is_none() {
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                }

                let result = self.execute_tool(&call).await?;
                scratch.push(Message::tool(format_tool_result(&result), call.id.clone()));
                invocations.push(Invocation { call, result });
            }
        }

        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    async fn call_engine(&self, scratch: &[Message], schemas: &[ToolSchema]) -> Result<Completion> {
        let timeout = self.config.provider_timeout;
        tokio::time::timeout(
            timeout,
            self.provider.complete(scratch, schemas, &self.config.generation),
        )
        .await
        .map_err(|_| AgentError::Timeout {
            operation: "reasoning engine call".into(),
            elapsed: timeout,
        })?
    }

    /// Execute a tool call.
    ///
    /// Dispatch errors (unknown name, bad arguments) and timeouts end the
    /// turn; execution failures are fed back to the engine as results.
    async fn execute_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        tracing::debug!(tool = %call.name, "Executing tool");
        let timeout = self.config.tool_timeout;

        let outcome = tokio::time::timeout(timeout, self.tools.execute(call))
            .await
            .map_err(|_| AgentError::Timeout {
                operation: format!("capability '{}'", call.name),
                elapsed: timeout,
            })?;

        match outcome {
            Ok(mut result) => {
                result.id.clone_from(&call.id);
                Ok(result)
            }
            Err(e) if e.is_dispatch_error() => {
                tracing::warn!(tool = %call.name, error = %e, "Rejected tool call");
                Err(e)
            }
            Err(e) => Ok(ToolResult {
                name: call.name.clone(),
                id: call.id.clone(),
                success: false,
                output: format!("Error: {e}"),
                data: None,
            }),
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Capability requests carried by a completion: native calls first, then
/// fenced ```tool blocks, then a bare inline JSON object.
pub fn parse_tool_calls(completion: &Completion) -> Vec<ToolCall> {
    if !completion.tool_calls.is_empty() {
        return completion.tool_calls.clone();
    }

    let content = completion.content.as_str();
    let mut calls = Vec::new();
    let tool_start = "```tool";
    let tool_end = "```";

    let mut rest = content;
    while let Some(start_idx) = rest.find(tool_start) {
        let after_marker = &rest[start_idx + tool_start.len()..];
        let Some(end_idx) = after_marker.find(tool_end) else {
            break;
        };
        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::debug!(error = %e, "Ignoring unparsable tool block"),
        }
        rest = &after_marker[end_idx + tool_end.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }
    calls
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

/// Assistant message recorded in the scratch history for a tool request
fn assistant_echo(completion: &Completion, calls: &[ToolCall]) -> String {
    if completion.content.trim().is_empty() {
        serde_json::to_string(calls).unwrap_or_default()
    } else {
        completion.content.clone()
    }
}

/// Format tool result for the engine
fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelInfo, ProviderInfo};
    use crate::tool::ParameterSchema;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions in order; errors once the script runs out.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Completion>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Completion>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo { name: "scripted".into(), models: vec![], supports_tools: true })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::ProviderUnavailable("script exhausted".into())))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "lookup".into(),
                description: "Look something up".into(),
                parameters: vec![ParameterSchema::required_string("key", "What to look up")],
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            match call.str_arg("key") {
                Some("missing") => Err(AgentError::ToolExecution("no such key".into())),
                Some(key) => Ok(ToolResult::success("lookup", format!("value of {key}"))),
                None => unreachable!("validated"),
            }
        }
    }

    fn agent(script: Vec<Result<Completion>>, config: AgentConfig) -> (Agent, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(script));
        let mut tools = ToolRegistry::new();
        tools.register(LookupTool).unwrap();
        (Agent::new(provider.clone(), Arc::new(tools), config), provider)
    }

    #[test]
    fn test_parse_fenced_tool_call() {
        let content = r#"Let me check that for you.
```tool
{"tool": "get_machine_telemetry", "arguments": {"machine_id": "CNC-01"}}
```"#;
        let calls = parse_tool_calls(&Completion::text(content));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_machine_telemetry");
        assert_eq!(calls[0].str_arg("machine_id"), Some("CNC-01"));
    }

    #[test]
    fn test_parse_multiple_and_inline_calls() {
        let content = "```tool\n{\"tool\": \"a\"}\n```\nthen\n```tool\n{\"tool\": \"b\"}\n```";
        let names: Vec<String> = parse_tool_calls(&Completion::text(content))
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let inline = parse_tool_calls(&Completion::text(r#"{"tool": "lookup", "arguments": {"key": "k"}}"#));
        assert_eq!(inline.len(), 1);

        assert!(parse_tool_calls(&Completion::text("Pump-A is fine.")).is_empty());
    }

    #[tokio::test]
    async fn test_direct_answer_runs_no_tools() {
        let (agent, _) = agent(vec![Ok(Completion::text("Hello operator."))], AgentConfig::default());
        let outcome = agent.run_turn(&[], "hi").await;
        assert_eq!(outcome.reply.unwrap(), "Hello operator.");
        assert!(outcome.invocations.is_empty());
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let (agent, provider) = agent(
            vec![
                Ok(Completion::calls(vec![ToolCall::new("lookup").arg("key", "alpha")])),
                Ok(Completion::text("alpha looks fine")),
            ],
            AgentConfig::default(),
        );

        let history = vec![Message::user("earlier"), Message::assistant("earlier reply")];
        let outcome = agent.run_turn(&history, "check alpha").await;

        assert_eq!(outcome.reply.unwrap(), "alpha looks fine");
        assert_eq!(outcome.invocations.len(), 1);
        assert!(outcome.invocations[0].result.success);
        assert!(outcome.invocations[0].result.id.is_some());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // system + 2 history + utterance
        assert_eq!(seen[0].len(), 4);
        assert_eq!(seen[0][0].role, Role::System);
        let last = seen[1].last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert!(last.content.contains("value of alpha"));
    }

    #[tokio::test]
    async fn test_execution_failure_is_recoverable() {
        let (agent, _) = agent(
            vec![
                Ok(Completion::calls(vec![ToolCall::new("lookup").arg("key", "missing")])),
                Ok(Completion::text("could not find it")),
            ],
            AgentConfig::default(),
        );
        let outcome = agent.run_turn(&[], "find missing").await;
        assert_eq!(outcome.reply.unwrap(), "could not find it");
        assert!(!outcome.invocations[0].result.success);
    }

    #[tokio::test]
    async fn test_unknown_tool_ends_turn() {
        let (agent, _) = agent(
            vec![Ok(Completion::calls(vec![ToolCall::new("open_valve")]))],
            AgentConfig::default(),
        );
        let outcome = agent.run_turn(&[], "open it").await;
        assert!(matches!(outcome.reply, Err(AgentError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_iteration_guard() {
        let looping: Vec<Result<Completion>> = (0..5)
            .map(|_| Ok(Completion::calls(vec![ToolCall::new("lookup").arg("key", "x")])))
            .collect();
        let config = AgentConfig { max_iterations: 3, ..AgentConfig::default() };
        let (agent, _) = agent(looping, config);

        let outcome = agent.run_turn(&[], "loop").await;
        assert!(matches!(outcome.reply, Err(AgentError::MaxIterations(3))));
        assert_eq!(outcome.invocations.len(), 3);
    }

    #[tokio::test]
    async fn test_engine_failure_keeps_invocations() {
        let (agent, _) = agent(
            vec![
                Ok(Completion::calls(vec![ToolCall::new("lookup").arg("key", "alpha")])),
                Err(AgentError::ProviderUnavailable("connection refused".into())),
            ],
            AgentConfig::default(),
        );
        let outcome = agent.run_turn(&[], "check alpha").await;
        assert!(matches!(outcome.reply, Err(AgentError::ProviderUnavailable(_))));
        assert_eq!(outcome.invocations.len(), 1);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
