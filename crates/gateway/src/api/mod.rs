pub mod evaluations;
pub mod rpc;
pub mod screenshots;
pub mod tasks;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Build the full API router.
///
/// `POST /v1` and `GET /v1/health` are public; task control and the
/// screenshot surface sit behind the bearer-token middleware whenever
/// `config.api_token` is set.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health)).route("/v1", post(rpc::handle));

    let protected = Router::new()
        .route("/v1/tasks/:id", get(tasks::get_task))
        .route("/v1/tasks/:id/cancel", post(tasks::cancel_task))
        .route("/v1/tasks/:id/events", get(tasks::task_events_sse))
        .route("/v1/evaluations", post(evaluations::submit))
        .route("/v1/evaluations/:id", get(evaluations::get))
        .route("/screenshots/:filename", get(screenshots::serve))
        .route_layer(middleware::from_fn_with_state(state, require_api_token));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Gate the protected surface behind `Authorization: Bearer <token>` when
/// `config.api_token` is configured. No token configured means the
/// surface is left open, matching a local/dev deployment. The supplied
/// token is hashed and compared in constant time so a byte-by-byte
/// mismatch doesn't leak timing information about the real token.
async fn require_api_token(State(state): State<AppState>, request: Request, next: Next) -> impl IntoResponse {
    let Some(expected) = state.config.api_token.as_deref() else {
        return next.run(request).await;
    };
    let expected_hash = Sha256::digest(expected.as_bytes());

    let supplied = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    let supplied_hash = Sha256::digest(supplied.as_bytes());

    if bool::from(supplied_hash.ct_eq(&expected_hash)) {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "missing or invalid bearer token" }))).into_response()
    }
}
