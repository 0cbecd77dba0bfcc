//! The agent loop implementation.

use std::path::PathBuf;
use std::sync::Arc;

use codevox_classifier::{ProjectSpec, classify};
use codevox_core::error::{Error, ProviderError};
use codevox_core::message::{Conversation, Message, Role};
use codevox_core::plan::PlanStep;
use codevox_core::provider::{Provider, ProviderRequest};
use codevox_core::tool::{ToolCall, ToolName, ToolOutcome};
use codevox_tools::ToolCatalog;
use tracing::{debug, info, warn};

use crate::prompt::build_system_prompt;

/// How many consecutive unparseable model replies end the turn with a
/// degraded answer instead of another retry.
const MAX_PARSE_FAILURES: u32 = 2;

/// How one turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model produced a final answer (possibly a degraded one after
    /// repeated malformed replies).
    Completed,
    /// The step budget ran out before a final answer. A defined terminal
    /// outcome, not an error.
    StepBudgetExceeded,
}

/// One entry in the reasoning trace.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Thought,
    Action,
    Observation,
}

/// The result of one agent turn.
#[derive(Debug)]
pub struct TurnResult {
    /// The final answer text shown to the user.
    pub answer: String,

    /// How the turn ended.
    pub status: TurnStatus,

    /// Every tool execution, success or failure, in order.
    pub tool_outcomes: Vec<ToolOutcome>,

    /// Model calls consumed.
    pub steps_used: u32,

    /// What the classifier derived from the utterance.
    pub project: ProjectSpec,

    /// Reasoning trace (thoughts, actions, observations).
    pub trace: Vec<TraceEntry>,
}

/// The agent loop: one instance per request, no shared mutable state.
pub struct AgentRunner {
    provider: Arc<dyn Provider>,
    catalog: Arc<ToolCatalog>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
}

impl AgentRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        catalog: Arc<ToolCatalog>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            catalog,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_steps: 20,
        }
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Set the maximum tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Process one utterance to completion.
    ///
    /// Appends the user message, the model's replies, and every tool
    /// observation to `conversation`; the caller owns the history and may
    /// resupply it for follow-up turns.
    ///
    /// Tool failures, unknown tool names, and malformed model replies
    /// become observations the model sees on its next iteration. Provider
    /// transport errors abort this turn only. A missing credential is a
    /// caller bug and fails fast before the first model call.
    ///
    /// Cancellation is dropping the returned future (e.g. the caller
    /// disconnected): the loop stops at the pending await and issues no
    /// further model or tool calls.
    pub async fn run(
        &self,
        utterance: &str,
        conversation: &mut Conversation,
    ) -> Result<TurnResult, Error> {
        if !self.provider.has_credential() {
            return Err(Error::Config {
                message: "no API credential supplied for this request".into(),
            });
        }

        let root_label = self
            .catalog
            .root()
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.catalog.root().to_path_buf());
        let project = classify(utterance, &root_label);

        info!(
            conversation_id = %conversation.id,
            category = %project.category,
            "Agent turn starting"
        );

        // Seed (or refresh) the system prompt as the first message.
        let system_prompt = build_system_prompt(&self.catalog.definitions(), &project);
        if conversation.messages.is_empty() || conversation.messages[0].role != Role::System {
            conversation.messages.insert(0, Message::system(&system_prompt));
        } else {
            conversation.messages[0] = Message::system(&system_prompt);
        }

        conversation.push(Message::user(utterance));

        let mut tool_outcomes: Vec<ToolOutcome> = Vec::new();
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut parse_failures = 0u32;

        for step in 1..=self.max_steps {
            debug!(step, max_steps = self.max_steps, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                response_format: Some(PlanStep::response_format()),
            };

            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Model call usage"
                );
            }

            let raw = response.message.content.clone();
            conversation.push(response.message);

            let plan_step = match PlanStep::parse(&raw) {
                Ok(parsed) => {
                    parse_failures = 0;
                    parsed
                }
                Err(ProviderError::MalformedOutput(reason)) => {
                    warn!(step, %reason, "Model reply did not parse into a plan step");
                    parse_failures += 1;
                    if parse_failures >= MAX_PARSE_FAILURES {
                        let answer = format!(
                            "I could not produce a valid next step after {parse_failures} attempts \
                             and had to stop. No further changes were made. Last problem: {reason}"
                        );
                        conversation.push(Message::assistant(&answer));
                        return Ok(TurnResult {
                            answer,
                            status: TurnStatus::Completed,
                            tool_outcomes,
                            steps_used: step,
                            project,
                            trace,
                        });
                    }
                    conversation.push(Message::observation(
                        serde_json::json!({
                            "step": "observe",
                            "error": "Your previous reply was not a single valid JSON plan step. \
                                      Reply with exactly one JSON object in the required format."
                        })
                        .to_string(),
                    ));
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            match plan_step {
                PlanStep::Plan { content } => {
                    debug!(step, "Plan: {content}");
                    trace.push(TraceEntry {
                        kind: TraceKind::Thought,
                        content,
                    });
                }
                PlanStep::FinalAnswer { content } => {
                    info!(
                        conversation_id = %conversation.id,
                        steps = step,
                        tool_calls = tool_outcomes.len(),
                        "Agent turn completed"
                    );
                    return Ok(TurnResult {
                        answer: content,
                        status: TurnStatus::Completed,
                        tool_outcomes,
                        steps_used: step,
                        project,
                        trace,
                    });
                }
                PlanStep::ToolCall { tool, arguments } => {
                    trace.push(TraceEntry {
                        kind: TraceKind::Action,
                        content: format!("{tool}({arguments})"),
                    });

                    let call = ToolCall {
                        name: tool.clone(),
                        arguments: arguments.clone(),
                    };

                    let outcome = match self.catalog.execute(&call).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(tool = %tool, error = %e, "Tool execution failed");
                            let output = match ToolName::parse(&tool) {
                                // A known tool that failed: report the failure.
                                Some(_) => format!("Error: {e}"),
                                // Unknown name: tell the model what exists so
                                // it can self-correct next iteration.
                                None => format!(
                                    "Error: Tool '{tool}' not found. Available tools: {:?}",
                                    ToolName::ALL.map(|n| n.as_str())
                                ),
                            };
                            ToolOutcome::failure(&tool, output)
                        }
                    };

                    trace.push(TraceEntry {
                        kind: TraceKind::Observation,
                        content: outcome.output.clone(),
                    });

                    conversation.push(Message::observation(
                        serde_json::json!({
                            "step": "observe",
                            "tool": outcome.tool,
                            "input": arguments,
                            "output": outcome.output,
                        })
                        .to_string(),
                    ));

                    tool_outcomes.push(outcome);
                }
            }
        }

        // Budget exhausted: a defined terminal outcome, not an error.
        let succeeded = tool_outcomes.iter().filter(|o| o.success).count();
        let failed = tool_outcomes.len() - succeeded;
        let answer = format!(
            "I reached the limit of {} reasoning steps before finishing this request. \
             {succeeded} tool call(s) succeeded and {failed} failed; the results so far are \
             listed in the tool output. Please refine the request or raise the step limit.",
            self.max_steps
        );
        warn!(
            conversation_id = %conversation.id,
            max_steps = self.max_steps,
            "Step budget exceeded"
        );
        conversation.push(Message::assistant(&answer));

        Ok(TurnResult {
            answer,
            status: TurnStatus::StepBudgetExceeded,
            tool_outcomes,
            steps_used: self.max_steps,
            project,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codevox_core::provider::{ProviderResponse, Usage};
    use codevox_tools::ToolPolicy;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider that replays a fixed script of replies.
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        calls: AtomicUsize,
        credential: bool,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
                credential: true,
            }
        }

        /// A provider that sends the same reply forever.
        fn repeating(reply: &str) -> Self {
            let p = Self::new(&[]);
            *p.replies.lock().unwrap() = vec![reply.to_string()];
            p
        }

        fn without_credential(mut self) -> Self {
            self.credential = false;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            let content = if replies.len() == 1 {
                replies[0].clone()
            } else {
                replies.pop().expect("script exhausted")
            };
            Ok(ProviderResponse {
                message: Message::assistant(content),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "scripted-model".into(),
            })
        }
    }

    /// A provider that always fails with an auth error.
    struct FailingProvider;

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::AuthenticationFailed("bad key".into()))
        }
    }

    fn catalog() -> (tempfile::TempDir, Arc<ToolCatalog>) {
        let dir = tempfile::tempdir().unwrap();
        let catalog =
            ToolCatalog::new(ToolPolicy::new(dir.path().join("ai_projects"))).unwrap();
        (dir, Arc::new(catalog))
    }

    fn runner(provider: Arc<dyn Provider>, catalog: Arc<ToolCatalog>) -> AgentRunner {
        AgentRunner::new(provider, catalog, "scripted-model", 0.2)
    }

    #[tokio::test]
    async fn direct_final_answer() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "output", "content": "Hello! How can I help?"}"#,
        ]));
        let agent = runner(provider.clone(), catalog);

        let mut conv = Conversation::new();
        let result = agent.run("Hello!", &mut conv).await.unwrap();

        assert_eq!(result.answer, "Hello! How can I help?");
        assert_eq!(result.status, TurnStatus::Completed);
        assert_eq!(result.steps_used, 1);
        assert!(result.tool_outcomes.is_empty());
        // System + user + assistant
        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn plan_steps_are_traced() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "plan", "content": "The user wants a greeting"}"#,
            r#"{"step": "output", "content": "Hi."}"#,
        ]));
        let agent = runner(provider, catalog);

        let mut conv = Conversation::new();
        let result = agent.run("Say hi", &mut conv).await.unwrap();

        assert_eq!(result.steps_used, 2);
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].kind, TraceKind::Thought);
    }

    #[tokio::test]
    async fn calculator_end_to_end() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "tool", "tool": "create_file", "arguments": {"file_path": "calculator_app/index.html", "content": "<html><body>calc</body></html>"}}"#,
            r#"{"step": "output", "content": "Created a calculator app"}"#,
        ]));
        let agent = runner(provider, catalog.clone());

        let mut conv = Conversation::new();
        let result = agent
            .run("Create a calculator app", &mut conv)
            .await
            .unwrap();

        assert_eq!(result.answer, "Created a calculator app");
        assert_eq!(result.tool_outcomes.len(), 1);
        assert!(result.tool_outcomes[0].success);

        let written = std::fs::read_to_string(
            catalog.root().join("calculator_app/index.html"),
        )
        .unwrap();
        assert_eq!(written, "<html><body>calc</body></html>");

        // The observation went back to the model as a developer message
        assert!(
            conv.messages
                .iter()
                .any(|m| m.role == Role::Observation && m.content.contains("created successfully"))
        );
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "tool", "tool": "format_disk", "arguments": {}}"#,
            r#"{"step": "output", "content": "Sorry, wrong tool."}"#,
        ]));
        let agent = runner(provider, catalog);

        let mut conv = Conversation::new();
        let result = agent.run("do something", &mut conv).await.unwrap();

        assert_eq!(result.status, TurnStatus::Completed);
        assert_eq!(result.tool_outcomes.len(), 1);
        assert!(!result.tool_outcomes[0].success);
        assert!(result.tool_outcomes[0].output.contains("not found"));
        assert!(result.tool_outcomes[0].output.contains("create_file"));
    }

    #[tokio::test]
    async fn tool_failure_feeds_back_and_loop_continues() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "tool", "tool": "read_file", "arguments": {"file_path": "missing.py"}}"#,
            r#"{"step": "output", "content": "That file does not exist."}"#,
        ]));
        let agent = runner(provider, catalog);

        let mut conv = Conversation::new();
        let result = agent.run("read missing.py", &mut conv).await.unwrap();

        assert_eq!(result.status, TurnStatus::Completed);
        assert!(!result.tool_outcomes[0].success);
        assert!(result.tool_outcomes[0].output.contains("Not found"));
    }

    #[tokio::test]
    async fn malformed_reply_self_heals() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            "Sure! I'll create that file for you.",
            r#"{"step": "output", "content": "Recovered."}"#,
        ]));
        let agent = runner(provider.clone(), catalog);

        let mut conv = Conversation::new();
        let result = agent.run("hello", &mut conv).await.unwrap();

        assert_eq!(result.answer, "Recovered.");
        assert_eq!(result.steps_used, 2);
        assert_eq!(provider.calls(), 2);
        // The corrective observation is in the history
        assert!(
            conv.messages
                .iter()
                .any(|m| m.role == Role::Observation && m.content.contains("valid JSON plan step"))
        );
    }

    #[tokio::test]
    async fn repeated_malformed_replies_degrade_gracefully() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::repeating("never json"));
        let agent = runner(provider.clone(), catalog);

        let mut conv = Conversation::new();
        let result = agent.run("hello", &mut conv).await.unwrap();

        assert_eq!(result.status, TurnStatus::Completed);
        assert!(result.answer.contains("could not produce a valid next step"));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn adversarial_model_never_exceeds_step_budget() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::repeating(
            r#"{"step": "tool", "tool": "nonexistent_tool", "arguments": {}}"#,
        ));
        let agent = runner(provider.clone(), catalog).with_max_steps(5);

        let mut conv = Conversation::new();
        let result = agent.run("loop forever", &mut conv).await.unwrap();

        assert_eq!(result.status, TurnStatus::StepBudgetExceeded);
        assert_eq!(provider.calls(), 5);
        assert_eq!(result.steps_used, 5);
        assert_eq!(result.tool_outcomes.len(), 5);
        assert!(result.answer.contains("limit of 5 reasoning steps"));
    }

    #[tokio::test]
    async fn missing_credential_fails_fast() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(
            ScriptedProvider::new(&[r#"{"step": "output", "content": "x"}"#]).without_credential(),
        );
        let agent = runner(provider.clone(), catalog);

        let mut conv = Conversation::new();
        let err = agent.run("hello", &mut conv).await.unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn provider_error_aborts_turn_only() {
        let (_guard, catalog) = catalog();
        let agent = runner(Arc::new(FailingProvider), catalog);

        let mut conv = Conversation::new();
        let err = agent.run("hello", &mut conv).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Provider(ProviderError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn system_prompt_carries_folder_hint() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "output", "content": "ok"}"#,
        ]));
        let agent = runner(provider, catalog);

        let mut conv = Conversation::new();
        let result = agent.run("Create a todo app", &mut conv).await.unwrap();

        assert_eq!(result.project.category.as_str(), "todo");
        assert!(conv.messages[0].content.contains("todo_app"));
        assert!(conv.messages[0].content.contains("create_file"));
    }

    #[tokio::test]
    async fn followup_turn_reuses_history() {
        let (_guard, catalog) = catalog();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"step": "output", "content": "first"}"#,
            r#"{"step": "output", "content": "second"}"#,
        ]));
        let agent = runner(provider, catalog);

        let mut conv = Conversation::new();
        agent.run("one", &mut conv).await.unwrap();
        let before = conv.messages.len();
        agent.run("two", &mut conv).await.unwrap();

        // Second turn appended to, not replaced, the history
        assert!(conv.messages.len() > before);
        // Still exactly one system message, at the front
        assert_eq!(
            conv.messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
    }
}
