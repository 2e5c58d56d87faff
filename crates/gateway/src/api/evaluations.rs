//! Evaluation Harness control surface.
//!
//! - `POST /v1/evaluations`      — submit a named benchmark run, QUEUED for the sweeper
//! - `GET  /v1/evaluations/:id`  — fetch the evaluation record and its per-task scores

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use webagent_domain::model::{EvalTaskSpec, EvaluationSpec};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitEvaluationRequest {
    model_id: String,
    tasks: Vec<EvalTaskSpec>,
}

pub async fn submit(State(state): State<AppState>, Json(req): Json<SubmitEvaluationRequest>) -> impl IntoResponse {
    let spec = EvaluationSpec::new(&req.model_id, req.tasks);
    let record = state.evaluation_store.submit(spec);
    Json(record).into_response()
}

pub async fn get(State(state): State<AppState>, Path(eval_id): Path<Uuid>) -> impl IntoResponse {
    match state.evaluation_store.get(eval_id) {
        Some(record) => Json(record).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "evaluation not found" }))).into_response(),
    }
}
