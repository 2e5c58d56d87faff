//! Task control API — task lookup, cancellation, and the SSE progress
//! stream.
//!
//! - `GET  /v1/tasks/:id`          — hydrated task snapshot (task + steps + artifacts)
//! - `POST /v1/tasks/:id/cancel`   — cancel a queued/running task
//! - `GET  /v1/tasks/:id/events`   — SSE stream of task events, resumable via `Last-Event-ID`

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use uuid::Uuid;

use crate::runtime::{event_bus, SequencedEvent, TaskEvent};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tasks/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> impl IntoResponse {
    match state.task_store.fetch(task_id) {
        Some(hydrated) => Json(serde_json::json!({
            "task": hydrated.task,
            "steps": hydrated.steps,
            "artifacts": hydrated.artifacts,
        }))
        .into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "task not found" }))).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/tasks/:id/cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel_task(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> impl IntoResponse {
    let Some(task) = state.task_store.get(task_id) else {
        return (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "task not found" }))).into_response();
    };

    if task.status.is_terminal() {
        return (
            axum::http::StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "task is already in a terminal state", "task_id": task_id })),
        )
            .into_response();
    }

    // The running step checks the token between steps; the orchestrator
    // transitions the task to CANCELLED once it observes it.
    state.cancel_map.cancel(task_id);

    Json(serde_json::json!({ "task_id": task_id, "cancelled": true })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/tasks/:id/events (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const HEARTBEAT_IDLE: std::time::Duration = std::time::Duration::from_secs(15);
const CLOSE_AFTER_ENDED: std::time::Duration = std::time::Duration::from_secs(10);

pub async fn task_events_sse(State(state): State<AppState>, Path(task_id): Path<Uuid>, headers: HeaderMap) -> impl IntoResponse {
    let Some(task) = state.task_store.get(task_id) else {
        let stream = futures_util::stream::once(async {
            Ok::<_, std::convert::Infallible>(Event::default().event("error").data(r#"{"error":"task not found"}"#))
        });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    };

    // A `Last-Event-ID` header of a sequence number we've already passed
    // for a now-terminal task means the client already saw everything;
    // reply with the final snapshot and close instead of replaying.
    let resume_from: Option<u64> = headers.get("last-event-id").and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok());

    if task.status.is_terminal() {
        let data = serde_json::to_string(&task).unwrap_or_default();
        let stream = futures_util::stream::once(async move { Ok::<_, std::convert::Infallible>(Event::default().event("task-snapshot").data(data)) });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    }

    let rx = state.event_bus.subscribe(task_id);
    let stream = make_task_event_stream(rx, resume_from);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_IDLE)).into_response()
}

fn make_task_event_stream(mut rx: tokio::sync::broadcast::Receiver<SequencedEvent>, resume_from: Option<u64>) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        loop {
            let next = tokio::time::timeout(HEARTBEAT_IDLE, async { event_bus::recv_or_lag(&mut rx).await }).await;

            let sequenced = match next {
                Ok(Some(s)) => s,
                Ok(None) => break,
                Err(_elapsed) => {
                    yield Ok(Event::default().event("heartbeat").data("{}"));
                    continue;
                }
            };

            if let Some(min) = resume_from {
                if sequenced.sequence <= min {
                    continue;
                }
            }

            let Some(event) = sequenced.event else {
                yield Ok(Event::default().id(sequenced.sequence.to_string()).event("lag").data(r#"{"warning":"events were dropped"}"#));
                continue;
            };

            let event_name = event_name(&event);
            let data = serde_json::to_string(&event).unwrap_or_default();
            let terminal = event.is_terminal();
            yield Ok(Event::default().id(sequenced.sequence.to_string()).event(event_name).data(data));

            if terminal {
                tokio::time::sleep(CLOSE_AFTER_ENDED).await;
                break;
            }
        }
    }
}

fn event_name(event: &TaskEvent) -> &'static str {
    match event {
        TaskEvent::TaskQueued { .. } => "task-queued",
        TaskEvent::TaskStarted { .. } => "task-started",
        TaskEvent::StepStarted { .. } => "step-started",
        TaskEvent::StepCompleted { .. } => "step-completed",
        TaskEvent::StepFailed { .. } => "step-failed",
        TaskEvent::ScreenshotCaptured { .. } => "screenshot-captured",
        TaskEvent::TaskEnded { .. } => "task-ended",
        TaskEvent::Heartbeat { .. } => "heartbeat",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_covers_every_variant() {
        let now = chrono::Utc::now();
        let task_id = Uuid::new_v4();
        assert_eq!(event_name(&TaskEvent::TaskQueued { task_id, tool_name: "x".into(), max_steps: 1, created_at: now }), "task-queued");
        assert_eq!(event_name(&TaskEvent::Heartbeat { task_id, now }), "heartbeat");
        assert_eq!(
            event_name(&TaskEvent::TaskEnded { task_id, terminal_status: "COMPLETED".into(), ended_at: now, steps_completed: 1, early_completion: false }),
            "task-ended"
        );
    }
}
