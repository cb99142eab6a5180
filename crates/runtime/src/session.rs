//! Conversation orchestration.

use tracing::{debug, warn};

use crate::catalog::{FunctionSpec, ToolCatalog};
use crate::error::{Error, Result};
use crate::model::{Backend, Message, ModelRequest, ModelResponse};
use crate::tools::ToolHost;

/// The only place tool-usage heuristics live. Everything else is mechanism.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to external tools. \
     Prefer answering directly from your own knowledge. Invoke a tool only when the request \
     genuinely requires external data or an action you cannot perform yourself. After using \
     tools, give the user a concise final answer.";

/// Substituted when the model produces neither text nor tool calls.
const NO_RESPONSE_PLACEHOLDER: &str = "[no response generated]";

/// A conversation session: one model backend, one tool host, no cross-query
/// memory.
///
/// Each call to [`process_query`] starts a fresh conversation seeded with the
/// system prompt and the new user input. The backend and host are exclusively
/// owned; tool calls are serialized by this type's `&mut` methods.
///
/// [`process_query`]: Session::process_query
pub struct Session<B, H> {
    backend: B,
    host: H,
    system: String,
    max_tool_rounds: usize,
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Self {
            backend,
            host,
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: 1,
        }
    }

    /// Replace the tool-usage policy prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Bound on tool rounds per query: after each round of executed calls,
    /// one follow-up completion is issued; a response that *still* requests
    /// calls once the bound is exhausted is reported, not silently truncated.
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        self.host.catalog()
    }

    /// Process one user query into one final answer.
    ///
    /// Tool calls execute strictly in the order the model requested them,
    /// each folded back as one tool-role message, all before the round's
    /// single follow-up completion. The answer is every produced segment
    /// (annotations and model text) joined with line breaks.
    pub async fn process_query(&mut self, query: &str) -> Result<String> {
        if !self.host.is_open() {
            return Err(Error::Disconnected);
        }

        let specs = self.host.catalog().function_specs();
        let mut conversation = vec![Message::system(&self.system), Message::user(query)];
        let mut segments: Vec<String> = Vec::new();

        let mut response = self.complete(&conversation, &specs).await?;

        let mut rounds = 0;
        while !response.tool_calls.is_empty() && rounds < self.max_tool_rounds {
            if !response.content.is_empty() {
                segments.push(response.content.clone());
                conversation.push(Message::assistant(&response.content));
            }

            for call in &response.tool_calls {
                let args = serde_json::Value::Object(call.arguments.clone());
                segments.push(format!("[calling tool {} with args {args}]", call.name));

                let result = match self.host.execute(call).await {
                    Ok(text) => text,
                    Err(Error::UnknownTool(name)) => {
                        warn!(tool = %name, "model requested a tool absent from the catalog");
                        segments.push(format!("[tool {name} is not available]"));
                        format!("error: unknown tool '{name}'")
                    }
                    Err(Error::ToolExecution(payload)) => {
                        debug!(tool = %call.name, error = %payload, "tool call failed");
                        format!("error: {payload}")
                    }
                    Err(fatal) => {
                        // Broken transport aborts the turn; release the child
                        // now so later queries fail fast instead of hanging.
                        self.host.close().await;
                        return Err(fatal);
                    }
                };
                conversation.push(Message::tool(result));
            }

            rounds += 1;
            response = self.complete(&conversation, &specs).await?;
        }

        if !response.tool_calls.is_empty() {
            let skipped: Vec<&str> = response
                .tool_calls
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            warn!(limit = self.max_tool_rounds, ?skipped, "tool round limit reached");
            segments.push(format!(
                "[tool round limit of {} reached; skipped requested call(s): {}]",
                self.max_tool_rounds,
                skipped.join(", ")
            ));
        }

        if !response.content.is_empty() {
            segments.push(response.content);
        }
        if segments.is_empty() {
            segments.push(NO_RESPONSE_PLACEHOLDER.to_string());
        }
        Ok(segments.join("\n"))
    }

    /// Release the tool host. Idempotent; safe after a broken transport.
    pub async fn close(&mut self) {
        self.host.close().await;
    }

    async fn complete(
        &self,
        conversation: &[Message],
        specs: &[FunctionSpec],
    ) -> Result<ModelResponse> {
        let response = self
            .backend
            .call(ModelRequest {
                messages: conversation,
                tools: specs,
            })
            .await?;
        debug!(
            tool_calls = response.tool_calls.len(),
            has_content = !response.content.is_empty(),
            "completion received"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolDescriptor;
    use crate::model::{ModelError, ToolCall};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Shared event log asserting ordering across backend and host.
    type EventLog = Arc<Mutex<Vec<String>>>;

    struct ScriptedBackend {
        responses: Mutex<Vec<ModelResponse>>,
        requests: Mutex<Vec<Vec<Message>>>,
        events: EventLog,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<ModelResponse>, events: EventLog) -> Self {
            let mut responses = responses;
            responses.reverse(); // pop() from the back
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
                events,
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> Vec<Message> {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    impl Backend for &ScriptedBackend {
        async fn call(
            &self,
            request: ModelRequest<'_>,
        ) -> std::result::Result<ModelResponse, ModelError> {
            self.events.lock().unwrap().push("complete".to_string());
            self.requests.lock().unwrap().push(request.messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ModelError::Api("script exhausted".to_string()))
        }
    }

    struct FakeHost {
        catalog: ToolCatalog,
        open: bool,
        break_transport: bool,
        events: EventLog,
    }

    impl FakeHost {
        fn new(catalog: ToolCatalog, events: EventLog) -> Self {
            Self {
                catalog,
                open: true,
                break_transport: false,
                events,
            }
        }
    }

    impl ToolHost for FakeHost {
        fn catalog(&self) -> &ToolCatalog {
            &self.catalog
        }

        fn is_open(&self) -> bool {
            self.open
        }

        async fn execute(&mut self, call: &ToolCall) -> Result<String> {
            if self.break_transport {
                return Err(Error::TransportBroken("channel closed mid-call".into()));
            }
            if self.catalog.get(&call.name).is_none() {
                return Err(Error::UnknownTool(call.name.clone()));
            }
            self.events.lock().unwrap().push(format!("exec {}", call.name));
            Ok(format!("{} ok", call.name))
        }

        async fn close(&mut self) {
            self.open = false;
        }
    }

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
        }
    }

    fn text(content: &str) -> ModelResponse {
        ModelResponse {
            content: content.to_string(),
            tool_calls: vec![],
        }
    }

    fn calls(names: &[&str]) -> ModelResponse {
        ModelResponse {
            content: String::new(),
            tool_calls: names
                .iter()
                .map(|n| ToolCall {
                    name: n.to_string(),
                    arguments: serde_json::Map::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn direct_answer_issues_one_completion() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(vec![text("Hello!")], events.clone());
        let host = FakeHost::new(ToolCatalog::empty(), events.clone());
        let mut session = Session::new(&backend, host);

        let answer = session.process_query("Hello").await.unwrap();
        assert_eq!(answer, "Hello!");
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn conversation_is_seeded_fresh_each_query() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(vec![text("one"), text("two")], events.clone());
        let host = FakeHost::new(ToolCatalog::empty(), events.clone());
        let mut session = Session::new(&backend, host).with_system("policy prompt");

        session.process_query("first").await.unwrap();
        session.process_query("second").await.unwrap();

        for (i, user) in ["first", "second"].iter().enumerate() {
            let conversation = backend.request(i);
            assert_eq!(conversation.len(), 2);
            assert_eq!(conversation[0], Message::system("policy prompt"));
            assert_eq!(conversation[1], Message::user(*user));
        }
    }

    #[tokio::test]
    async fn tool_calls_run_in_order_before_followup() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["first_tool", "second_tool"]), text("done")],
            events.clone(),
        );
        let catalog = ToolCatalog::from_descriptors(vec![
            descriptor("first_tool"),
            descriptor("second_tool"),
        ])
        .unwrap();
        let host = FakeHost::new(catalog, events.clone());
        let mut session = Session::new(&backend, host);

        let answer = session.process_query("do both").await.unwrap();

        // Both executions land between the two completions.
        assert_eq!(
            *events.lock().unwrap(),
            vec!["complete", "exec first_tool", "exec second_tool", "complete"]
        );

        // The follow-up conversation carries one tool message per call, in order.
        let followup = backend.request(1);
        assert_eq!(followup[2], Message::tool("first_tool ok"));
        assert_eq!(followup[3], Message::tool("second_tool ok"));

        assert!(answer.contains("[calling tool first_tool"));
        assert!(answer.ends_with("done"));
    }

    #[tokio::test]
    async fn place_order_scenario() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["place_order"]), text("Your order is in.")],
            events.clone(),
        );
        let catalog = ToolCatalog::from_descriptors(vec![descriptor("place_order")]).unwrap();
        let host = FakeHost::new(catalog, events.clone());
        let mut session = Session::new(&backend, host);

        let answer = session
            .process_query("place an order for 2 pizzas")
            .await
            .unwrap();

        assert_eq!(backend.request_count(), 2);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["complete", "exec place_order", "complete"]
        );
        assert!(answer.ends_with("Your order is in."));
    }

    #[tokio::test]
    async fn unknown_tool_survives_the_turn() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["delete_everything"]), text("I could not do that.")],
            events.clone(),
        );
        let host = FakeHost::new(ToolCatalog::empty(), events.clone());
        let mut session = Session::new(&backend, host);

        let answer = session.process_query("wipe it all").await.unwrap();

        // Recovered: the failure went back to the model as a tool result...
        let followup = backend.request(1);
        assert_eq!(
            followup[2],
            Message::tool("error: unknown tool 'delete_everything'")
        );
        // ...and the user sees it reported in the answer.
        assert!(answer.contains("[tool delete_everything is not available]"));
        assert!(answer.ends_with("I could not do that."));
    }

    #[tokio::test]
    async fn broken_transport_aborts_turn_and_disconnects_session() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["first_tool"]), text("unreachable")],
            events.clone(),
        );
        let catalog = ToolCatalog::from_descriptors(vec![descriptor("first_tool")]).unwrap();
        let mut host = FakeHost::new(catalog, events.clone());
        host.break_transport = true;
        let mut session = Session::new(&backend, host);

        let err = session.process_query("go").await.unwrap_err();
        assert!(matches!(err, Error::TransportBroken(_)));

        // Teardown ran; the next query fails fast with a clear condition.
        let err = session.process_query("again").await.unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[tokio::test]
    async fn round_limit_is_reported_not_silent() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["first_tool"]), calls(&["second_tool"])],
            events.clone(),
        );
        let catalog = ToolCatalog::from_descriptors(vec![
            descriptor("first_tool"),
            descriptor("second_tool"),
        ])
        .unwrap();
        let host = FakeHost::new(catalog, events.clone());
        let mut session = Session::new(&backend, host); // max_tool_rounds = 1

        let answer = session.process_query("chain").await.unwrap();

        // Only the first round executed; the second round's request is reported.
        assert_eq!(
            *events.lock().unwrap(),
            vec!["complete", "exec first_tool", "complete"]
        );
        assert!(answer.contains("tool round limit of 1 reached"));
        assert!(answer.contains("second_tool"));
    }

    #[tokio::test]
    async fn deeper_chaining_when_bound_is_raised() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(
            vec![calls(&["first_tool"]), calls(&["second_tool"]), text("done")],
            events.clone(),
        );
        let catalog = ToolCatalog::from_descriptors(vec![
            descriptor("first_tool"),
            descriptor("second_tool"),
        ])
        .unwrap();
        let host = FakeHost::new(catalog, events.clone());
        let mut session = Session::new(&backend, host).with_max_tool_rounds(2);

        let answer = session.process_query("chain").await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "complete",
                "exec first_tool",
                "complete",
                "exec second_tool",
                "complete"
            ]
        );
        assert!(answer.ends_with("done"));
    }

    #[tokio::test]
    async fn empty_completion_yields_placeholder() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(vec![text("")], events.clone());
        let host = FakeHost::new(ToolCatalog::empty(), events.clone());
        let mut session = Session::new(&backend, host);

        let answer = session.process_query("say nothing").await.unwrap();
        assert_eq!(answer, "[no response generated]");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let events: EventLog = Default::default();
        let backend = ScriptedBackend::new(vec![], events.clone());
        let host = FakeHost::new(ToolCatalog::empty(), events.clone());
        let mut session = Session::new(&backend, host);

        session.close().await;
        session.close().await;
        assert!(matches!(
            session.process_query("hi").await,
            Err(Error::Disconnected)
        ));
    }
}
