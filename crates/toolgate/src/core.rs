use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use toolgate_common::{EmitTarget, EventSink, PendingHandle, Tool, ToolCall};
use toolgate_tools::{InvocationError, ToolContext, ToolExecutor};

use crate::error::CoreError;
use crate::events::{CoreEvent, EventCallback};

/// Runs the tool calls of one generation step against the platform's event sink.
///
/// Every call gets a pending operation that is either completed with the tool's
/// result or cancelled with a human-readable reason; none is left dangling.
pub struct Core {
    pub tool_executor: ToolExecutor,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    event_callback: Option<EventCallback>,
}

impl Core {
    pub fn new(tool_executor: ToolExecutor, sink: Arc<dyn EventSink>) -> Self {
        Self {
            tool_executor,
            sink,
            cancel: CancellationToken::new(),
            event_callback: None,
        }
    }

    #[must_use]
    pub fn with_event_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(CoreEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.event_callback = Some(Box::new(move |event| Box::pin(callback(event))));
        self
    }

    /// Ties in-flight calls to an outer cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Abandons every in-flight call; their pending operations are cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Definitions of every tool the model may call.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tool_executor.get_all_tools()
    }

    async fn notify(&self, event: CoreEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event).await;
        }
    }

    /// Runs one tool call and resolves its pending operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending operation cannot be created, the tool
    /// fails or is cancelled, or the result cannot be emitted. In the last two
    /// cases the pending operation has already been cancelled with the reason.
    pub async fn run_tool_call(
        &self,
        event_id: &str,
        call: &ToolCall,
    ) -> Result<String, CoreError> {
        let name = call.name.as_str();
        debug!("Tool Name: {name} (id: {})", call.id);
        debug!("Tool Arguments: {}", call.arguments);

        let handle = self
            .sink
            .create_pending(&format!("Calling {name}..."))
            .await
            .map_err(CoreError::Sink)?;

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let ctx = ToolContext::new(event_id)
            .with_cancel(self.cancel.child_token())
            .with_progress(Arc::new(move |status: &str| {
                // The receiver lives until the call finishes.
                let _ = tx.send(status.to_string());
            }));

        let executor = &self.tool_executor;
        let execute = async move { executor.execute_tool(call, &ctx).await };
        let (result, ()) = tokio::join!(execute, self.forward_progress(name, &handle, rx));

        match result {
            Ok(output) => {
                debug!("Tool {name} executed successfully");
                debug!("Tool result: {output}");
                let payload = json!({ "result": result_value(&output) });
                if let Err(e) = self.sink.emit(payload, EmitTarget::Complete(handle.clone())).await
                {
                    let reason = format!("Failed to deliver result of {name}: {e}");
                    self.resolve_failed(&handle, &reason).await;
                    return Err(CoreError::Sink(e));
                }
                self.notify(CoreEvent::ToolResult {
                    name: name.to_string(),
                    result: output.clone(),
                    success: true,
                })
                .await;
                Ok(output)
            }
            Err(e) => {
                let cancelled = e
                    .downcast_ref::<InvocationError>()
                    .is_some_and(InvocationError::is_cancelled);
                let reason = failure_message(name, &e);
                debug!("Tool {name} execution failed: {reason}");

                self.resolve_failed(&handle, &reason).await;
                self.notify(CoreEvent::ToolResult {
                    name: name.to_string(),
                    result: reason.clone(),
                    success: false,
                })
                .await;

                if cancelled {
                    Err(CoreError::Cancelled(reason))
                } else {
                    Err(CoreError::ToolError {
                        name: name.to_string(),
                        message: reason,
                    })
                }
            }
        }
    }

    /// Runs every call of a generation step concurrently.
    ///
    /// Outcomes are returned in request order.
    pub async fn run_tool_calls(
        &self,
        event_id: &str,
        calls: &[ToolCall],
    ) -> Vec<Result<String, CoreError>> {
        debug!("Running {} tool calls for event {event_id}", calls.len());
        join_all(calls.iter().map(|call| self.run_tool_call(event_id, call))).await
    }

    /// Emits `payload` as a fresh event linked to `parent_event_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the event.
    pub async fn echo(
        &self,
        payload: Value,
        parent_event_ids: Vec<String>,
    ) -> Result<(), CoreError> {
        self.sink
            .emit(
                payload,
                EmitTarget::Echo {
                    secondary_parent_event_ids: parent_event_ids,
                },
            )
            .await
            .map_err(CoreError::Sink)
    }

    async fn forward_progress(
        &self,
        name: &str,
        handle: &PendingHandle,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(status) = rx.recv().await {
            if let Err(e) = self.sink.update_pending(handle, &status).await {
                warn!("Failed to update pending operation {handle}: {e}");
            }
            self.notify(CoreEvent::ToolRetrying {
                name: name.to_string(),
                status,
            })
            .await;
        }
    }

    async fn resolve_failed(&self, handle: &PendingHandle, reason: &str) {
        if let Err(e) = self.sink.cancel_pending(handle, reason).await {
            warn!("Failed to cancel pending operation {handle}: {e}");
        }
    }
}

/// The tool output as JSON when it is JSON text, otherwise as a string.
fn result_value(output: &str) -> Value {
    serde_json::from_str(output).unwrap_or_else(|_| Value::String(output.to_string()))
}

/// Human-readable failure reason, with the endpoint's own detail when it sent one.
fn failure_message(name: &str, error: &anyhow::Error) -> String {
    let message = error.to_string();
    let detail = error
        .downcast_ref::<InvocationError>()
        .and_then(InvocationError::detail)
        .filter(|detail| !message.contains(detail));

    match detail {
        Some(detail) => format!("Tool {name} failed: {message} ({detail})"),
        None => format!("Tool {name} failed: {message}"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use toolgate_client::HttpTransport;
    use toolgate_common::{ApplicationSecret, ClientConfig, Function, RetryConfig, ToolDescriptor};
    use toolgate_tools::{RemoteToolSet, ToolImplementation};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        Create(String),
        Update(String, String),
        Emit(Value, EmitTarget),
        Cancel(String, String),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<SinkCall>>,
        next: AtomicUsize,
        fail_emit: bool,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn create_pending(&self, status: &str) -> anyhow::Result<PendingHandle> {
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(SinkCall::Create(status.to_string()));
            Ok(PendingHandle::new(format!("pending-{id}")))
        }

        async fn update_pending(
            &self,
            handle: &PendingHandle,
            status: &str,
        ) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Update(handle.to_string(), status.to_string()));
            Ok(())
        }

        async fn emit(&self, payload: Value, target: EmitTarget) -> anyhow::Result<()> {
            if self.fail_emit {
                anyhow::bail!("queue closed");
            }
            self.calls.lock().unwrap().push(SinkCall::Emit(payload, target));
            Ok(())
        }

        async fn cancel_pending(
            &self,
            handle: &PendingHandle,
            reason: &str,
        ) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Cancel(handle.to_string(), reason.to_string()));
            Ok(())
        }
    }

    /// Reports progress once, then answers or fails per its arguments.
    struct ScriptedTool;

    #[async_trait]
    impl ToolImplementation for ScriptedTool {
        fn get_definition(&self) -> Tool {
            Tool::builder()
                .function(Function {
                    name: "scripted".to_string(),
                    description: "Test tool".to_string(),
                    parameters: json!({"type": "object"}),
                })
                .build()
        }

        async fn execute(&self, args: &Value, ctx: &ToolContext) -> anyhow::Result<String> {
            ctx.report("working");
            if let Some(reason) = args["fail"].as_str() {
                anyhow::bail!("{reason}");
            }
            Ok(args["answer"].to_string())
        }
    }

    fn core_with(sink: Arc<RecordingSink>) -> Core {
        let mut executor = ToolExecutor::new();
        executor.add_tool(ScriptedTool);
        Core::new(executor, sink)
    }

    #[tokio::test]
    async fn test_success_completes_pending_with_result() {
        let sink = Arc::new(RecordingSink::default());
        let core = core_with(Arc::clone(&sink));

        let call = ToolCall::new("scripted", json!({"answer": {"temp": 21}}));
        let output = core.run_tool_call("evt-1", &call).await.unwrap();

        assert_eq!(output, r#"{"temp":21}"#);
        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Create("Calling scripted...".to_string()),
                SinkCall::Update("pending-0".to_string(), "working".to_string()),
                SinkCall::Emit(
                    json!({"result": {"temp": 21}}),
                    EmitTarget::Complete(PendingHandle::new("pending-0"))
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_cancels_pending_with_reason() {
        let sink = Arc::new(RecordingSink::default());
        let core = core_with(Arc::clone(&sink));

        let call = ToolCall::new("scripted", json!({"fail": "disk full"}));
        let err = core.run_tool_call("evt-1", &call).await.unwrap_err();

        assert!(matches!(err, CoreError::ToolError { ref name, .. } if name == "scripted"));
        let calls = sink.calls();
        assert_eq!(
            calls.last(),
            Some(&SinkCall::Cancel(
                "pending-0".to_string(),
                "Tool scripted failed: disk full".to_string()
            ))
        );
        assert!(!calls.iter().any(|c| matches!(c, SinkCall::Emit(..))));
    }

    #[tokio::test]
    async fn test_unknown_tool_still_resolves_pending() {
        let sink = Arc::new(RecordingSink::default());
        let core = core_with(Arc::clone(&sink));

        let err = core
            .run_tool_call("evt-1", &ToolCall::new("missing", json!({})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Unknown tool: 'missing'"));
        assert!(matches!(sink.calls().last(), Some(SinkCall::Cancel(..))));
    }

    #[tokio::test]
    async fn test_emit_failure_cancels_pending() {
        let sink = Arc::new(RecordingSink {
            fail_emit: true,
            ..RecordingSink::default()
        });
        let core = core_with(Arc::clone(&sink));

        let err = core
            .run_tool_call("evt-1", &ToolCall::new("scripted", json!({"answer": 1})))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Sink(_)));
        assert!(matches!(sink.calls().last(), Some(SinkCall::Cancel(..))));
    }

    #[tokio::test]
    async fn test_run_tool_calls_keeps_request_order() {
        let sink = Arc::new(RecordingSink::default());
        let core = core_with(Arc::clone(&sink));

        let calls = vec![
            ToolCall::new("scripted", json!({"answer": 1})),
            ToolCall::new("scripted", json!({"fail": "nope"})),
            ToolCall::new("scripted", json!({"answer": 3})),
        ];
        let results = core.run_tool_calls("evt-1", &calls).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "1");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), "3");

        let resolved = sink
            .calls()
            .iter()
            .filter(|c| matches!(c, SinkCall::Emit(..) | SinkCall::Cancel(..)))
            .count();
        assert_eq!(resolved, 3);
    }

    #[tokio::test]
    async fn test_event_callback_sees_results() {
        let sink = Arc::new(RecordingSink::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::clone(&seen);
        let core = core_with(sink).with_event_callback(move |event| {
            events.lock().unwrap().push(event);
            async {}
        });

        core.run_tool_call("evt-1", &ToolCall::new("scripted", json!({"answer": true})))
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CoreEvent::ToolRetrying {
                    name: "scripted".to_string(),
                    status: "working".to_string(),
                },
                CoreEvent::ToolResult {
                    name: "scripted".to_string(),
                    result: "true".to_string(),
                    success: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_echo_emits_linked_event() {
        let sink = Arc::new(RecordingSink::default());
        let core = core_with(Arc::clone(&sink));

        core.echo(json!({"note": "hi"}), vec!["evt-1".to_string()])
            .await
            .unwrap();

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Emit(
                json!({"note": "hi"}),
                EmitTarget::Echo {
                    secondary_parent_event_ids: vec!["evt-1".to_string()]
                }
            )]
        );
    }

    fn remote_core(server: &MockServer, sink: Arc<RecordingSink>) -> Core {
        let descriptor = ToolDescriptor::builder()
            .identifier("tool-A")
            .name("get_weather")
            .description("Look up the weather")
            .url(server.uri())
            .build();
        let transport: Arc<dyn toolgate_client::ToolTransport> =
            Arc::new(HttpTransport::new(ClientConfig::default()).unwrap());
        let retry = RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            ..RetryConfig::default()
        };
        let set = RemoteToolSet::from_descriptors(
            [descriptor],
            &transport,
            &ApplicationSecret::new("S"),
            &retry,
        )
        .unwrap();
        Core::new(set.into_executor(), sink)
    }

    #[tokio::test]
    async fn test_remote_retries_surface_as_pending_updates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "sunny"})))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let core = remote_core(&server, Arc::clone(&sink));

        let output = core
            .run_tool_call("evt-1", &ToolCall::new("get_weather", json!({"city": "Lisbon"})))
            .await
            .unwrap();

        assert_eq!(output, r#""sunny""#);
        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Create("Calling get_weather...".to_string()),
                SinkCall::Update(
                    "pending-0".to_string(),
                    "Retrying get_weather (attempt 2/3)...".to_string()
                ),
                SinkCall::Emit(
                    json!({"result": "sunny"}),
                    EmitTarget::Complete(PendingHandle::new("pending-0"))
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_remote_exhaustion_cancels_with_attempt_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let core = remote_core(&server, Arc::clone(&sink));

        let err = core
            .run_tool_call("evt-1", &ToolCall::new("get_weather", json!({})))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Tool execution error: Tool get_weather failed: \
             get_weather failed after 3 attempts: HTTP 504 Gateway Timeout"
        );
        assert!(matches!(sink.calls().last(), Some(SinkCall::Cancel(..))));
    }

    #[tokio::test]
    async fn test_remote_failure_includes_endpoint_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Unauthorized"}})),
            )
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let core = remote_core(&server, Arc::clone(&sink));

        core.run_tool_call("evt-1", &ToolCall::new("get_weather", json!({})))
            .await
            .unwrap_err();

        assert_eq!(
            sink.calls().last(),
            Some(&SinkCall::Cancel(
                "pending-0".to_string(),
                "Tool get_weather failed: HTTP 401 Unauthorized: Unauthorized".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_cancel_resolves_pending_as_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let core = remote_core(&server, Arc::clone(&sink));
        core.cancel();
        assert!(core.is_cancelled());

        let err = core
            .run_tool_call("evt-1", &ToolCall::new("get_weather", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled(_)));
        assert!(matches!(sink.calls().last(), Some(SinkCall::Cancel(..))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
