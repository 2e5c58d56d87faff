//! Static screenshot serving — `GET /screenshots/:filename` resolves
//! against `ArtifactStore::screenshots_dir()` directly by filename, not
//! by artifact id, since that's what the public URLs the pipeline hands
//! out point at.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn serve(State(state): State<AppState>, Path(filename): Path<String>) -> impl IntoResponse {
    if filename.contains('/') || filename.contains("..") {
        return (StatusCode::BAD_REQUEST, "invalid filename").into_response();
    }

    let path = state.artifact_store.screenshots_dir().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("png") => "image/png",
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("webp") => "image/webp",
                _ => "application/octet-stream",
            };
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "screenshot not found").into_response(),
    }
}
