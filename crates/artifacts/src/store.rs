//! In-memory artifact registry, the artifact-side counterpart to the
//! task store's step records. Holds every `Artifact` metadata row;
//! actual bytes live on disk under `screenshots_dir`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use webagent_domain::model::Artifact;

pub struct ArtifactStore {
    artifacts: RwLock<HashMap<Uuid, Artifact>>,
    screenshots_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(screenshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts: RwLock::new(HashMap::new()),
            screenshots_dir: screenshots_dir.into(),
        }
    }

    pub fn screenshots_dir(&self) -> &Path {
        &self.screenshots_dir
    }

    pub fn insert(&self, artifact: Artifact) -> Artifact {
        self.artifacts.write().insert(artifact.artifact_id, artifact.clone());
        artifact
    }

    pub fn get(&self, id: Uuid) -> Option<Artifact> {
        self.artifacts.read().get(&id).cloned()
    }

    pub fn list_for_task(&self, task_id: Uuid) -> Vec<Artifact> {
        let mut out: Vec<Artifact> = self.artifacts.read().values().filter(|a| a.task_id == task_id).cloned().collect();
        out.sort_by_key(|a| a.created_at);
        out
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes artifacts (and their backing files) past their retention
    /// window. An artifact is "task-linked" when `task_is_live(task_id)`
    /// holds; linked artifacts get `linked_window`, everything else gets
    /// `unlinked_window`. Both windows are enforced by this single pass
    /// per §4.7. Returns the number of artifacts removed.
    pub fn sweep_retention(
        &self,
        now: DateTime<Utc>,
        unlinked_window: chrono::Duration,
        linked_window: chrono::Duration,
        task_is_live: impl Fn(Uuid) -> bool,
    ) -> usize {
        let mut artifacts = self.artifacts.write();
        let expired: Vec<Uuid> = artifacts
            .values()
            .filter(|a| {
                let age = now.signed_duration_since(a.created_at);
                let window = if task_is_live(a.task_id) { linked_window } else { unlinked_window };
                age >= window
            })
            .map(|a| a.artifact_id)
            .collect();

        for id in &expired {
            if let Some(a) = artifacts.remove(id) {
                let path = Path::new(&a.content_ref);
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(path) {
                        tracing::warn!(error = %e, path = %path.display(), "failed to remove expired artifact file");
                    }
                }
            }
        }
        expired.len()
    }
}
