use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::llm::ChatModel;
use crate::messages::ChatMessage;
use crate::session::SessionStore;
use crate::tools::ToolExecutor;

/// Instruction prefixed to every model request. Not persisted in thread
/// history; threads stay portable across prompt revisions.
pub const SYSTEM_PROMPT: &str = "\
You are an operations assistant for Zscaler tenants. You answer questions and \
make changes by calling tools against the correct tenant's API.

First determine which tenant or tenants the user is asking about. Tenant names \
are plain strings chosen by the user; if no tenant name was given, ask for one \
instead of guessing. A single request may span several tenants; call the \
appropriate tool once per tenant and combine the results.

Format answers in markdown, using tables where they make lists easier to read. \
When asked what you can do, describe the available tools and give a few \
example questions.";

/// Upper bound on assistant rounds within one turn. A model that keeps
/// requesting tools would otherwise cycle forever.
pub const DEFAULT_MAX_TURNS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Assistant,
    Tools,
    Done,
}

/// Drives one conversation turn to completion: assistant → tools → assistant
/// … → done. Messages produced during the turn are buffered locally and
/// appended to the store only when the turn completes, so a cancelled
/// (dropped or timed-out) turn leaves thread history untouched and a retry
/// is safe.
pub struct AgentRuntime {
    model: Arc<dyn ChatModel>,
    executor: Arc<dyn ToolExecutor>,
    store: Arc<dyn SessionStore>,
    system_prompt: String,
    max_turns: usize,
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ChatModel>,
        executor: Arc<dyn ToolExecutor>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            model,
            executor,
            store,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Run one turn for `thread_id` and return the final assistant text.
    pub async fn submit(&self, thread_id: &str, user_text: &str) -> Result<String> {
        let history = self.store.get(thread_id).await;
        let schemas = self.executor.schemas();

        let mut turn: Vec<ChatMessage> = vec![ChatMessage::user(user_text)];
        let mut state = TurnState::Assistant;
        let mut rounds = 0usize;

        let answer = loop {
            match state {
                TurnState::Assistant => {
                    rounds += 1;
                    if rounds > self.max_turns {
                        warn!(thread_id, rounds, "turn hit the assistant round limit");
                        let notice = ChatMessage::assistant(
                            "I stopped after reaching the tool-call limit for a single \
                             request. The results gathered so far are above; please narrow \
                             the request and try again.",
                        );
                        let text = notice.content.clone();
                        turn.push(notice);
                        break text;
                    }

                    let mut request =
                        Vec::with_capacity(1 + history.len() + turn.len());
                    request.push(ChatMessage::system(&self.system_prompt));
                    request.extend(history.iter().cloned());
                    request.extend(turn.iter().cloned());

                    let response = self.model.chat(&request, &schemas).await?;
                    let wants_tools = response.requests_tools();
                    turn.push(response);
                    state = if wants_tools { TurnState::Tools } else { TurnState::Done };
                }
                TurnState::Tools => {
                    // The most recent message is the assistant message that
                    // put us in this state. Results are appended in request
                    // order so they correlate positionally as well as by id.
                    let calls = turn
                        .last()
                        .map(|message| message.tool_calls.clone())
                        .unwrap_or_default();
                    for call in calls {
                        debug!(tool = %call.name, call_id = %call.id, "executing tool call");
                        let content = match self
                            .executor
                            .call(&call.name, call.arguments.clone())
                            .await
                        {
                            Ok(content) => content,
                            // Tool failures feed back into the conversation so
                            // the model can correct itself or explain.
                            Err(error) => format!("error: {error:#}"),
                        };
                        turn.push(ChatMessage::tool_result(&call.id, content));
                    }
                    state = TurnState::Assistant;
                }
                TurnState::Done => {
                    let text =
                        turn.last().map(|message| message.content.clone()).unwrap_or_default();
                    break text;
                }
            }
        };

        self.store.append(thread_id, turn).await;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{AgentRuntime, DEFAULT_MAX_TURNS};
    use crate::llm::{ChatModel, LlmError, ToolSchema};
    use crate::messages::{ChatMessage, Role, ToolCallRequest};
    use crate::session::{InMemorySessionStore, SessionStore};
    use crate::tools::ToolExecutor;

    /// Replays a fixed script of assistant responses and records what it was
    /// asked. When the script runs out it repeats its final entry.
    struct ScriptedModel {
        script: Mutex<Vec<ChatMessage>>,
        request_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<ChatMessage>) -> Self {
            Self { script: Mutex::new(script), request_sizes: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<ChatMessage, LlmError> {
            self.request_sizes.lock().await.push(messages.len());
            let mut script = self.script.lock().await;
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                Ok(script[0].clone())
            }
        }
    }

    struct FakeExecutor {
        calls: Mutex<Vec<(String, Value)>>,
        fail_on: Option<String>,
    }

    impl FakeExecutor {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()), fail_on: None }
        }

        fn failing_on(tool: &str) -> Self {
            Self { calls: Mutex::new(Vec::new()), fail_on: Some(tool.to_string()) }
        }
    }

    #[async_trait]
    impl ToolExecutor for FakeExecutor {
        fn schemas(&self) -> Vec<ToolSchema> {
            vec![ToolSchema {
                name: "zcc_list_devices".to_string(),
                description: "List enrolled devices".to_string(),
                parameters: json!({"type": "object"}),
            }]
        }

        async fn call(&self, name: &str, arguments: Value) -> Result<String> {
            self.calls.lock().await.push((name.to_string(), arguments));
            if self.fail_on.as_deref() == Some(name) {
                bail!("{name} failed: HTTP 500");
            }
            Ok(format!("result of {name}"))
        }
    }

    fn runtime(
        model: Arc<ScriptedModel>,
        executor: Arc<FakeExecutor>,
    ) -> (AgentRuntime, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        (AgentRuntime::new(model, executor, Arc::clone(&store) as _), store)
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest { id: id.to_string(), name: name.to_string(), arguments: args }
    }

    #[tokio::test]
    async fn plain_answer_terminates_after_one_assistant_step() {
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::assistant("hello there")]));
        let executor = Arc::new(FakeExecutor::new());
        let (runtime, store) = runtime(Arc::clone(&model), Arc::clone(&executor));

        let answer = runtime.submit("t1", "hi").await.unwrap();
        assert_eq!(answer, "hello there");
        assert!(executor.calls.lock().await.is_empty());

        let history = store.get("t1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn tool_cycle_appends_results_in_request_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_with_calls(
                "",
                vec![
                    call("c1", "zcc_list_devices", json!({"tenant_name": "Acme"})),
                    call("c2", "zcc_list_devices", json!({"tenant_name": "Globex"})),
                ],
            ),
            ChatMessage::assistant("both tenants look healthy"),
        ]));
        let executor = Arc::new(FakeExecutor::new());
        let (runtime, store) = runtime(Arc::clone(&model), Arc::clone(&executor));

        let answer = runtime.submit("t1", "check both tenants").await.unwrap();
        assert_eq!(answer, "both tenants look healthy");

        let history = store.get("t1").await;
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].tool_calls.len(), 2);
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(history[3].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(history[4].role, Role::Assistant);
        assert!(history[4].tool_calls.is_empty());

        let calls = executor.calls.lock().await;
        assert_eq!(calls[0].1["tenant_name"], "Acme");
        assert_eq!(calls[1].1["tenant_name"], "Globex");
    }

    #[tokio::test]
    async fn tool_failure_becomes_a_result_message_and_the_turn_continues() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_with_calls(
                "",
                vec![call("c1", "zcc_list_devices", json!({}))],
            ),
            ChatMessage::assistant("that tenant's API is failing"),
        ]));
        let executor = Arc::new(FakeExecutor::failing_on("zcc_list_devices"));
        let (runtime, store) = runtime(Arc::clone(&model), executor);

        let answer = runtime.submit("t1", "list devices").await.unwrap();
        assert_eq!(answer, "that tenant's API is failing");

        let history = store.get("t1").await;
        let result = &history[2];
        assert_eq!(result.role, Role::Tool);
        assert!(result.content.starts_with("error:"));
        assert!(result.content.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn a_model_that_always_requests_tools_hits_the_round_cap() {
        // Single-entry script repeats forever.
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::assistant_with_calls(
            "",
            vec![call("c", "zcc_list_devices", json!({}))],
        )]));
        let executor = Arc::new(FakeExecutor::new());
        let (runtime, _store) = runtime(Arc::clone(&model), Arc::clone(&executor));

        let answer = runtime.submit("t1", "loop forever").await.unwrap();
        assert!(answer.contains("tool-call limit"));
        assert_eq!(executor.calls.lock().await.len(), DEFAULT_MAX_TURNS);
    }

    #[tokio::test]
    async fn second_turn_resumes_from_persisted_history() {
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::assistant("noted")]));
        let executor = Arc::new(FakeExecutor::new());
        let (runtime, store) = runtime(Arc::clone(&model), executor);

        runtime.submit("t1", "first").await.unwrap();
        runtime.submit("t1", "second").await.unwrap();

        assert_eq!(store.get("t1").await.len(), 4);
        // system + user on turn one; system + 2 prior + user on turn two.
        let sizes = model.request_sizes.lock().await.clone();
        assert_eq!(sizes, vec![2, 4]);
    }

    #[tokio::test]
    async fn acme_scenario_invokes_exactly_one_tool_call() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_with_calls(
                "",
                vec![call("c1", "zcc_list_devices", json!({"tenant_name": "Acme"}))],
            ),
            ChatMessage::assistant("Acme has 2 enrolled devices."),
        ]));
        let executor = Arc::new(FakeExecutor::new());
        let (runtime, _store) = runtime(Arc::clone(&model), Arc::clone(&executor));

        let answer = runtime.submit("t1", "list devices for Acme").await.unwrap();
        assert_eq!(answer, "Acme has 2 enrolled devices.");

        let calls = executor.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "zcc_list_devices");
        assert_eq!(calls[0].1["tenant_name"], "Acme");
    }
}
