//! JSON-RPC 2.0 endpoint (`POST /v1`) — the single entry point MCP
//! clients speak to: `initialize`, `tools/list`, `tools/call`, and the
//! `notifications/initialized` no-op.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use webagent_domain::error::Error;
use webagent_domain::model::{StepRecord, StepStatus, TaskStatus};

use crate::runtime::{InvocationParams, RouteDecision, TaskEvent, TaskStore};
use crate::state::{AppState, ToolHandler};

const JSONRPC_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn ok(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
}

fn err(id: Option<Value>, code: i64, message: impl Into<String>, data: Option<Value>) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": RpcError { code, message: message.into(), data } })
}

/// `POST /v1` — dispatch a single JSON-RPC call.
pub async fn handle(State(state): State<AppState>, Json(req): Json<RpcRequest>) -> impl IntoResponse {
    let id = req.id.clone();
    let body = match req.method.as_str() {
        "initialize" => handle_initialize(id),
        "notifications/initialized" => return axum::http::StatusCode::NO_CONTENT.into_response(),
        "tools/list" => handle_tools_list(&state, id),
        "tools/call" => handle_tools_call(&state, id, req.params).await,
        other => err(id, -32601, format!("method not found: {other}"), None),
    };
    Json(body).into_response()
}

fn handle_initialize(id: Option<Value>) -> Value {
    ok(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": { "name": "webagentd", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": { "tools": {} },
        }),
    )
}

fn handle_tools_list(state: &AppState, id: Option<Value>) -> Value {
    let tools: Vec<Value> = state
        .registry
        .list()
        .iter()
        .map(|info| {
            json!({
                "name": info.name,
                "description": info.description,
                "inputSchema": info.schema,
            })
        })
        .collect();
    ok(id, json!({ "tools": tools }))
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

async fn handle_tools_call(state: &AppState, id: Option<Value>, params: Value) -> Value {
    let call: ToolCallParams = match serde_json::from_value(params) {
        Ok(c) => c,
        Err(e) => return err(id, -32602, format!("invalid params: {e}"), None),
    };

    let (tool, handler) = match state.registry.lookup(&call.name) {
        Ok(pair) => pair,
        Err(e) => return rpc_error_from(id, &e),
    };

    let invocation = match crate::runtime::validate_arguments(tool, &call.arguments) {
        Ok(p) => p,
        Err(e) => return rpc_error_from(id, &e),
    };

    match crate::runtime::decide(tool, &invocation) {
        RouteDecision::Synchronous => call_one_shot_tracked(&state.task_store, id, &call.name, call.arguments, &invocation, handler).await,
        RouteDecision::Queued(params) => {
            let instruction = call
                .arguments
                .get("instructions")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();

            let task = state.task_store.create_task(
                &call.name,
                call.arguments,
                params.max_steps,
                params.execution_mode,
                params.allow_early_completion,
            );
            state.event_bus.publish(TaskEvent::TaskQueued {
                task_id: task.task_id,
                tool_name: task.tool_name.clone(),
                max_steps: task.max_steps,
                created_at: task.created_at,
            });
            state.orchestrator.spawn(task.task_id, instruction);

            let base = format!("http://{}:{}", state.config.server.host, state.config.server.port);
            ok(
                id,
                json!({
                    "taskId": task.task_id,
                    "status": "QUEUED",
                    "progressUrl": format!("{base}/v1/tasks/{}/events", task.task_id),
                    "estimatedDurationMs": estimate_duration_ms(state, task.max_steps),
                }),
            )
        }
    }
}

/// Runs a one-shot tool call through the Task Store so it leaves the same
/// lifecycle trail a loopy call does: one Task, one StepRecord, both
/// terminal by the time the response is sent.
async fn call_one_shot_tracked(
    task_store: &TaskStore,
    id: Option<Value>,
    tool_name: &str,
    arguments: Value,
    invocation: &InvocationParams,
    handler: std::sync::Arc<std::sync::Arc<dyn ToolHandler>>,
) -> Value {
    let task = task_store.create_task(tool_name, arguments.clone(), invocation.max_steps, invocation.execution_mode, invocation.allow_early_completion);

    if let Err(e) = task_store.transition(task.task_id, TaskStatus::Queued, TaskStatus::Running, |t| t.started_at = Some(Utc::now())) {
        return rpc_error_from(id, &e);
    }
    let _ = task_store.record_step(task.task_id, StepRecord::pending(task.task_id, 1, format!("one-shot call: {tool_name}")));
    let _ = task_store.update_step(task.task_id, 1, |s| {
        s.status = StepStatus::Running;
        s.started_at = Some(Utc::now());
    });

    match handler.call_one_shot(arguments).await {
        Ok(value) => {
            let _ = task_store.update_step(task.task_id, 1, |s| {
                s.status = StepStatus::Completed;
                s.ended_at = Some(Utc::now());
                s.confidence = 1.0;
                s.result_text = Some(value.to_string());
            });
            let _ = task_store.transition(task.task_id, TaskStatus::Running, TaskStatus::Completed, |t| {
                t.ended_at = Some(Utc::now());
                t.current_step = 1;
                t.result_summary = Some(value.to_string());
            });
            ok(id, json!({ "content": [{ "type": "text", "text": value.to_string() }] }))
        }
        Err(e) => {
            let kind = e.kind();
            let _ = task_store.update_step(task.task_id, 1, |s| {
                s.status = StepStatus::Failed;
                s.ended_at = Some(Utc::now());
                s.error_kind = Some(kind);
            });
            let _ = task_store.transition(task.task_id, TaskStatus::Running, TaskStatus::Failed, |t| {
                t.ended_at = Some(Utc::now());
                t.error_kind = Some(kind);
            });
            rpc_error_from(id, &e)
        }
    }
}

fn estimate_duration_ms(state: &AppState, max_steps: u32) -> u64 {
    let browser = state.config.browser.clamped();
    u64::from(max_steps) * u64::from(browser.per_step_timeout_seconds) * 1000
}

fn rpc_error_from(id: Option<Value>, error: &Error) -> Value {
    let kind = error.kind();
    err(id, kind.rpc_code(), error.to_string(), Some(json!({ "kind": kind })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_reports_protocol_version() {
        let body = handle_initialize(Some(json!(1)));
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["id"], 1);
    }

    #[test]
    fn ok_and_err_shape_the_envelope() {
        let o = ok(Some(json!(2)), json!({ "a": 1 }));
        assert_eq!(o["jsonrpc"], JSONRPC_VERSION);
        assert!(o.get("error").is_none());

        let e = err(Some(json!(3)), -32601, "nope", None);
        assert_eq!(e["error"]["code"], -32601);
        assert!(e.get("result").is_none());
    }

    #[test]
    fn rpc_error_from_unknown_tool_uses_generic_tool_error_code() {
        let e = rpc_error_from(Some(json!(4)), &Error::UnknownTool("ghost".into()));
        assert_eq!(e["error"]["code"], -32000);
        assert_eq!(e["error"]["data"]["kind"], "UNKNOWN_TOOL");
    }

    #[test]
    fn rpc_error_from_invalid_arguments_uses_invalid_params() {
        let e = rpc_error_from(Some(json!(5)), &Error::InvalidArguments("bad".into()));
        assert_eq!(e["error"]["code"], -32602);
    }

    struct StubHandler {
        succeed: bool,
    }

    #[async_trait::async_trait]
    impl ToolHandler for StubHandler {
        async fn call_one_shot(&self, _arguments: Value) -> webagent_domain::error::Result<Value> {
            if self.succeed {
                Ok(json!({ "text": "Example Domain" }))
            } else {
                Err(Error::InvalidArguments("missing url".into()))
            }
        }
    }

    #[tokio::test]
    async fn one_shot_success_leaves_one_completed_task_with_one_completed_step() {
        let store = TaskStore::new();
        let handler: std::sync::Arc<std::sync::Arc<dyn ToolHandler>> = std::sync::Arc::new(std::sync::Arc::new(StubHandler { succeed: true }));
        let invocation = InvocationParams { max_steps: 1, execution_mode: webagent_domain::model::ExecutionMode::Auto, allow_early_completion: true };

        let body = call_one_shot_tracked(&store, Some(json!(1)), "browseWebAndReturnText", json!({}), &invocation, handler).await;
        assert!(body.get("error").is_none());

        let hydrated = store.fetch(store_single_task_id(&store)).unwrap();
        assert_eq!(hydrated.task.status, TaskStatus::Completed);
        assert_eq!(hydrated.steps.len(), 1);
        assert_eq!(hydrated.steps[0].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn one_shot_failure_leaves_task_failed_with_failed_step() {
        let store = TaskStore::new();
        let handler: std::sync::Arc<std::sync::Arc<dyn ToolHandler>> = std::sync::Arc::new(std::sync::Arc::new(StubHandler { succeed: false }));
        let invocation = InvocationParams { max_steps: 1, execution_mode: webagent_domain::model::ExecutionMode::Auto, allow_early_completion: true };

        let body = call_one_shot_tracked(&store, Some(json!(2)), "browseWebAndReturnText", json!({}), &invocation, handler).await;
        assert!(body.get("error").is_some());

        let hydrated = store.fetch(store_single_task_id(&store)).unwrap();
        assert_eq!(hydrated.task.status, TaskStatus::Failed);
        assert_eq!(hydrated.steps[0].status, StepStatus::Failed);
    }

    /// Test helper: both tests above create exactly one task in a fresh
    /// store, so there is exactly one id to recover.
    fn store_single_task_id(store: &TaskStore) -> uuid::Uuid {
        store.task_ids().into_iter().next().expect("one task should exist")
    }
}
