//! Screenshot Pipeline (§4.7): validates a raw capture, assigns a
//! deterministic filename, persists it under the screenshots directory,
//! and produces the `Artifact` row with its public URL.
//!
//! The multi-attempt capture fallback (full-page -> viewport -> minimal
//! -> extended wait) is driven by the caller, which owns the browser
//! session; this module only judges and publishes a single attempt.

use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;
use webagent_domain::error::{Error, Result};
use webagent_domain::model::{Artifact, ArtifactKind};

use crate::capture::RawCapture;
use crate::filename::build_filename;
use crate::store::ArtifactStore;
use crate::validation::validate_capture;

pub struct ScreenshotPipeline {
    store: std::sync::Arc<ArtifactStore>,
    base_url: String,
}

impl ScreenshotPipeline {
    pub fn new(store: std::sync::Arc<ArtifactStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
        }
    }

    /// Validates, writes, registers, and publishes one capture attempt.
    /// Returns `Err(ScreenshotFailed)` when validation rejects the bytes
    /// — the caller decides whether to retry with different capture
    /// options or fall through to `publish_error_blob`.
    pub fn publish(
        &self,
        capture: &RawCapture,
        task_id: Uuid,
        step_number: u32,
        page_url: &str,
        page_title: &str,
    ) -> Result<Artifact> {
        let (width, height) = validate_capture(&capture.png_bytes)
            .map_err(|failure| Error::ScreenshotFailed(format!("{failure:?}")))?;

        let captured_at = Utc::now();
        let filename = build_filename(page_url, page_title, captured_at);
        let path = self.store.screenshots_dir().join(&filename);

        std::fs::create_dir_all(self.store.screenshots_dir())?;
        std::fs::write(&path, &capture.png_bytes)?;

        let mut artifact = Artifact::new(
            task_id,
            Some(step_number),
            ArtifactKind::Screenshot,
            path.to_string_lossy().into_owned(),
            capture.png_bytes.len() as u64,
        );
        artifact.width = Some(width);
        artifact.height = Some(height);
        artifact.public_url = Some(format!("{}/screenshots/{}", self.base_url.trim_end_matches('/'), filename));

        Ok(self.store.insert(artifact))
    }

    /// Records a failed capture sequence as an `ERROR_BLOB` artifact so
    /// the step result and event stream still have something to point at.
    pub fn publish_error_blob(&self, task_id: Uuid, step_number: u32, message: &str) -> Result<Artifact> {
        let dir = self.store.screenshots_dir();
        std::fs::create_dir_all(dir)?;
        let filename = format!("error_{}_{}.txt", task_id, step_number);
        let path: PathBuf = dir.join(&filename);
        std::fs::write(&path, message)?;

        let artifact = Artifact::new(
            task_id,
            Some(step_number),
            ArtifactKind::ErrorBlob,
            path.to_string_lossy().into_owned(),
            message.len() as u64,
        );
        Ok(self.store.insert(artifact))
    }
}
