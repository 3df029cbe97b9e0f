use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolchat::offline_tools::offline_toolset;
use toolchat::schema::PassthroughSchema;
use toolchat::{
    BackendError, BackendResponse, ContentBlock, ConversationState, FunctionSpec, LlmBackend,
    LoopError, LoopObserver, Orchestrator, Role, SchemaAdapter, ToolCallRequest, ToolCallResult,
    ToolDescriptor, ToolInvoker, ToolSet, Turn,
};

/// Replies from a fixed script and remembers what it was sent.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<BackendResponse>>,
    repeat: Option<BackendResponse>,
    seen: Mutex<Vec<(Vec<Turn>, Vec<FunctionSpec>)>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<BackendResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn always(reply: BackendResponse) -> Self {
        Self {
            repeat: Some(reply),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn transcript(&self, call: usize) -> Vec<Turn> {
        self.seen.lock().unwrap()[call].0.clone()
    }

    fn offered(&self, call: usize) -> Vec<FunctionSpec> {
        self.seen.lock().unwrap()[call].1.clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn schema_adapter(&self) -> &dyn SchemaAdapter {
        &PassthroughSchema
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tools: &[FunctionSpec],
    ) -> Result<BackendResponse, BackendError> {
        self.seen
            .lock()
            .unwrap()
            .push((transcript.to_vec(), tools.to_vec()));
        if let Some(reply) = &self.repeat {
            return Ok(BackendResponse::new(reply.blocks.clone(), None));
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Api {
                status: 500,
                message: "script exhausted".into(),
            })
    }
}

/// Never answers; only cancellation gets past it.
struct StalledBackend;

#[async_trait]
impl LlmBackend for StalledBackend {
    fn name(&self) -> &str {
        "stalled"
    }

    fn schema_adapter(&self) -> &dyn SchemaAdapter {
        &PassthroughSchema
    }

    async fn generate(&self, _: &[Turn], _: &[FunctionSpec]) -> Result<BackendResponse, BackendError> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct RecordingInvoker {
    payload: Option<Value>,
    called: Mutex<Vec<String>>,
}

impl RecordingInvoker {
    fn returning(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Default::default()
        }
    }

    fn called(&self) -> Vec<String> {
        self.called.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for RecordingInvoker {
    async fn call(&self, request: &ToolCallRequest) -> ToolCallResult {
        self.called.lock().unwrap().push(request.id.clone());
        match &self.payload {
            Some(payload) => ToolCallResult::success(&request.id, payload.clone()),
            None => ToolCallResult::failure(&request.id, "tool host exploded"),
        }
    }
}

/// Cancels the session from inside a tool call, as ctrl-c during a tool would.
struct CancellingInvoker {
    cancel: CancellationToken,
}

#[async_trait]
impl ToolInvoker for CancellingInvoker {
    async fn call(&self, request: &ToolCallRequest) -> ToolCallResult {
        self.cancel.cancel();
        ToolCallResult::success(&request.id, json!(["notes.md"]))
    }
}

#[derive(Default)]
struct RecordingObserver {
    answers: Mutex<Vec<String>>,
    tool_calls: Mutex<Vec<String>>,
}

impl LoopObserver for RecordingObserver {
    fn tool_call(&self, request: &ToolCallRequest) {
        self.tool_calls.lock().unwrap().push(request.name.clone());
    }

    fn answer(&self, text: &str) {
        self.answers.lock().unwrap().push(text.to_string());
    }
}

fn request(id: &str, name: &str) -> ContentBlock {
    ContentBlock::ToolRequest(ToolCallRequest::new(id, name, json!({})))
}

fn asking(blocks: Vec<ContentBlock>) -> BackendResponse {
    BackendResponse::new(blocks, Some("tool_use".into()))
}

fn list_files_tools() -> ToolSet {
    ToolSet::new(vec![ToolDescriptor::new(
        "list_files",
        "list the files in a directory",
        json!({"type": "object", "properties": {}}),
    )])
    .unwrap()
}

#[tokio::test]
async fn text_reply_ends_after_one_backend_call() {
    let backend = Arc::new(ScriptedBackend::new(vec![BackendResponse::text("2+2 is 4.")]));
    let invoker = Arc::new(RecordingInvoker::default());
    let orchestrator = Orchestrator::new(backend.clone(), ToolSet::default(), invoker.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "What is 2+2?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert!(backend.offered(0).is_empty());
    assert_eq!(exchange.backend_calls, 1);
    assert_eq!(exchange.answer, "2+2 is 4.");

    let turns = exchange.state.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0], Turn::user("What is 2+2?"));
    assert_eq!(turns[1].role(), Role::Assistant);
    assert!(turns[1].text().contains('4'));
    assert!(invoker.called().is_empty());
}

#[tokio::test]
async fn tool_result_is_fed_back_before_the_answer() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![request("call_1", "list_files")]),
        BackendResponse::text("There are two files: a.txt and b.txt."),
    ]));
    let invoker = Arc::new(RecordingInvoker::returning(json!(["a.txt", "b.txt"])));
    let orchestrator = Orchestrator::new(backend.clone(), list_files_tools(), invoker.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "list files", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(backend.offered(0)[0].name, "list_files");

    let second = backend.transcript(1);
    assert_eq!(second.len(), 3);
    assert_eq!(
        second[2],
        Turn::tool_result(ToolCallResult::success("call_1", json!(["a.txt", "b.txt"])))
    );

    let roles: Vec<_> = exchange.state.turns().iter().map(Turn::role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]
    );
    assert!(exchange.state.is_settled());
    assert_eq!(invoker.called(), vec!["call_1"]);
}

#[tokio::test]
async fn results_keep_request_order() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![
            ContentBlock::text("Running three tools."),
            request("c3", "list_files"),
            request("c1", "list_files"),
            request("c2", "list_files"),
        ]),
        BackendResponse::text("done"),
    ]));
    let invoker = Arc::new(RecordingInvoker::returning(json!("ok")));
    let orchestrator = Orchestrator::new(backend, list_files_tools(), invoker.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "go", &CancellationToken::new())
        .await
        .unwrap();

    let answered: Vec<_> = exchange
        .state
        .turns()
        .iter()
        .flat_map(Turn::tool_results)
        .map(|result| result.call_id.clone())
        .collect();
    assert_eq!(answered, vec!["c3", "c1", "c2"]);
    assert_eq!(invoker.called(), vec!["c3", "c1", "c2"]);
    assert_eq!(exchange.state.turns()[1].text(), "Running three tools.");
}

#[tokio::test]
async fn failing_tools_become_failed_results() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![request("c1", "list_files"), request("c2", "list_files")]),
        asking(vec![request("c3", "list_files")]),
        BackendResponse::text("Sorry, the tool host is broken."),
    ]));
    let invoker = Arc::new(RecordingInvoker::default());
    let orchestrator = Orchestrator::new(backend.clone(), list_files_tools(), invoker);

    let exchange = orchestrator
        .run(ConversationState::new(), "list files", &CancellationToken::new())
        .await
        .unwrap();

    let results: Vec<_> = exchange
        .state
        .turns()
        .iter()
        .flat_map(Turn::tool_results)
        .cloned()
        .collect();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|result| !result.success));
    assert_eq!(backend.calls(), 3);
    assert_eq!(exchange.answer, "Sorry, the tool host is broken.");
}

#[tokio::test]
async fn nameless_request_is_answered_without_invoking() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![request("c1", ""), request("c2", "list_files")]),
        BackendResponse::text("ok"),
    ]));
    let invoker = Arc::new(RecordingInvoker::returning(json!([])));
    let orchestrator = Orchestrator::new(backend, list_files_tools(), invoker.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "hm", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(invoker.called(), vec!["c2"]);
    let first = exchange.state.turns()[2].tool_results().next().unwrap().clone();
    assert_eq!(first.call_id, "c1");
    assert!(!first.success);
}

#[tokio::test]
async fn unparsable_arguments_are_answered_without_invoking() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![ContentBlock::ToolRequest(ToolCallRequest::from_raw_arguments(
            "c1",
            "list_files",
            "{\"path\": ",
        ))]),
        BackendResponse::text("ok"),
    ]));
    let invoker = Arc::new(RecordingInvoker::returning(json!([])));
    let orchestrator = Orchestrator::new(backend, list_files_tools(), invoker.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "hm", &CancellationToken::new())
        .await
        .unwrap();

    assert!(invoker.called().is_empty());
    assert!(!exchange.state.turns()[2].tool_results().next().unwrap().success);
}

#[tokio::test]
async fn endless_tool_requests_hit_the_turn_limit() {
    let backend = Arc::new(ScriptedBackend::always(asking(vec![request("c", "list_files")])));
    let invoker = Arc::new(RecordingInvoker::returning(json!([])));
    let orchestrator =
        Orchestrator::new(backend.clone(), list_files_tools(), invoker).with_max_turns(3);

    let err = orchestrator
        .run(ConversationState::new(), "loop", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::LoopLimitExceeded(3)));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn backend_failure_propagates() {
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let orchestrator = Orchestrator::new(
        backend,
        ToolSet::default(),
        Arc::new(RecordingInvoker::default()),
    );

    let err = orchestrator
        .run(ConversationState::new(), "hello", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::Backend(BackendError::Api { status: 500, .. })));
}

#[tokio::test]
async fn cancelled_before_start_leaves_state_alone() {
    let backend = Arc::new(ScriptedBackend::new(vec![BackendResponse::text("never")]));
    let orchestrator = Orchestrator::new(
        backend.clone(),
        ToolSet::default(),
        Arc::new(RecordingInvoker::default()),
    );
    let seed = ConversationState::new().append(Turn::user("earlier")).unwrap();
    let seed = seed
        .append(Turn::assistant(vec![ContentBlock::text("reply")]))
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = orchestrator
        .run(seed.clone(), "now", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::Cancelled));
    assert_eq!(backend.calls(), 0);
    assert_eq!(seed.len(), 2);
}

#[tokio::test]
async fn cancellation_interrupts_a_pending_backend_call() {
    let orchestrator = Orchestrator::new(
        Arc::new(StalledBackend),
        ToolSet::default(),
        Arc::new(RecordingInvoker::default()),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .run(ConversationState::new(), "hello?", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, LoopError::Cancelled));
}

#[tokio::test]
async fn cancellation_during_a_tool_batch_commits_nothing() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![request("c1", "list_files")]),
        BackendResponse::text("never asked"),
    ]));
    let cancel = CancellationToken::new();
    let invoker = Arc::new(CancellingInvoker {
        cancel: cancel.clone(),
    });
    let orchestrator = Orchestrator::new(backend.clone(), list_files_tools(), invoker);
    let seed = ConversationState::new().append(Turn::user("earlier")).unwrap();

    let err = orchestrator
        .run(seed.clone(), "list files", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, LoopError::Cancelled));
    assert_eq!(backend.calls(), 1);
    assert_eq!(seed.len(), 1);
    assert_eq!(seed.turns()[0], Turn::user("earlier"));
}

#[tokio::test]
async fn second_prompt_continues_the_session() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        BackendResponse::text("Hi!"),
        BackendResponse::text("You said hello."),
    ]));
    let orchestrator = Orchestrator::new(
        backend.clone(),
        ToolSet::default(),
        Arc::new(RecordingInvoker::default()),
    );
    let cancel = CancellationToken::new();

    let first = orchestrator
        .run(ConversationState::new(), "hello", &cancel)
        .await
        .unwrap();
    let second = orchestrator
        .run(first.state.clone(), "what did I say?", &cancel)
        .await
        .unwrap();

    assert_eq!(first.state.len(), 2);
    assert_eq!(second.state.len(), 4);
    assert_eq!(backend.transcript(1).len(), 3);
    assert_eq!(backend.transcript(1)[0], Turn::user("hello"));
}

#[tokio::test]
async fn observer_sees_tool_calls_and_answer() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![request("c1", "list_files")]),
        BackendResponse::text("two files"),
    ]));
    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = Orchestrator::new(
        backend,
        list_files_tools(),
        Arc::new(RecordingInvoker::returning(json!(["a.txt", "b.txt"]))),
    )
    .with_observer(observer.clone());

    orchestrator
        .run(ConversationState::new(), "list files", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*observer.tool_calls.lock().unwrap(), vec!["list_files"]);
    assert_eq!(*observer.answers.lock().unwrap(), vec!["two files"]);
}

#[tokio::test]
async fn offline_tools_drive_a_full_exchange() {
    let host = Arc::new(offline_toolset().unwrap());
    let tools = ToolSet::fetch(host.as_ref()).await.unwrap();
    let backend = Arc::new(ScriptedBackend::new(vec![
        asking(vec![
            ContentBlock::ToolRequest(ToolCallRequest::new("c1", "sum", json!({"a": 2, "b": 2}))),
            ContentBlock::ToolRequest(ToolCallRequest::new("c2", "increment", json!({}))),
        ]),
        BackendResponse::text("2+2 is 4 and the counter is 1."),
    ]));
    let orchestrator = Orchestrator::new(backend.clone(), tools, host.clone());

    let exchange = orchestrator
        .run(ConversationState::new(), "add and count", &CancellationToken::new())
        .await
        .unwrap();

    let payloads: Vec<_> = exchange
        .state
        .turns()
        .iter()
        .flat_map(Turn::tool_results)
        .map(|result| result.payload.clone())
        .collect();
    assert_eq!(payloads, vec![json!("4"), json!("1")]);
    assert_eq!(host.context().get(), 1);
    assert_eq!(backend.offered(0).len(), 9);
}
