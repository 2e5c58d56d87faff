//! Task Store & Lifecycle (§4.3): the authoritative record of every
//! Task, its StepRecords, and its Artifacts, plus the CAS transition
//! rule that keeps `Task.status` honest.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use webagent_domain::error::{Error, Result};
use webagent_domain::model::{Artifact, ExecutionMode, StepRecord, Task, TaskStatus};

struct TaskEntry {
    task: Task,
    steps: Vec<StepRecord>,
    artifacts: Vec<Artifact>,
}

pub struct HydratedTask {
    pub task: Task,
    pub steps: Vec<StepRecord>,
    pub artifacts: Vec<Artifact>,
}

pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, TaskEntry>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self { tasks: RwLock::new(HashMap::new()) }
    }

    pub fn create_task(&self, tool_name: &str, arguments: serde_json::Value, max_steps: u32, execution_mode: ExecutionMode, allow_early_completion: bool) -> Task {
        let task = Task::new(tool_name, arguments, max_steps, execution_mode, allow_early_completion);
        self.tasks.write().insert(
            task.task_id,
            TaskEntry { task: task.clone(), steps: Vec::new(), artifacts: Vec::new() },
        );
        task
    }

    /// Compare-and-swap on `task.status`. Fails with `ILLEGAL_TRANSITION`
    /// if the current status isn't `from` or the edge isn't allowed.
    pub fn transition(&self, task_id: Uuid, from: TaskStatus, to: TaskStatus, apply: impl FnOnce(&mut Task)) -> Result<Task> {
        let mut tasks = self.tasks.write();
        let entry = tasks.get_mut(&task_id).ok_or_else(|| Error::Internal(format!("unknown task {task_id}")))?;

        if entry.task.status != from || !from.can_transition_to(to) {
            return Err(Error::IllegalTransition { from: format!("{:?}", entry.task.status), to: format!("{to:?}") });
        }

        entry.task.status = to;
        apply(&mut entry.task);
        Ok(entry.task.clone())
    }

    pub fn get(&self, task_id: Uuid) -> Option<Task> {
        self.tasks.read().get(&task_id).map(|e| e.task.clone())
    }

    /// Serializes one step record; enforces one-RUNNING-per-task by
    /// requiring callers to transition the prior step out of RUNNING
    /// before recording a new one (the orchestrator's loop does this
    /// naturally since steps run strictly sequentially).
    pub fn record_step(&self, task_id: Uuid, record: StepRecord) -> Result<()> {
        let mut tasks = self.tasks.write();
        let entry = tasks.get_mut(&task_id).ok_or_else(|| Error::Internal(format!("unknown task {task_id}")))?;
        entry.steps.push(record);
        Ok(())
    }

    pub fn update_step(&self, task_id: Uuid, step_number: u32, apply: impl FnOnce(&mut StepRecord)) -> Result<()> {
        let mut tasks = self.tasks.write();
        let entry = tasks.get_mut(&task_id).ok_or_else(|| Error::Internal(format!("unknown task {task_id}")))?;
        let step = entry
            .steps
            .iter_mut()
            .find(|s| s.step_number == step_number)
            .ok_or_else(|| Error::Internal(format!("unknown step {step_number} for task {task_id}")))?;
        apply(step);
        Ok(())
    }

    pub fn attach_artifact(&self, task_id: Uuid, artifact: Artifact) -> Result<()> {
        let mut tasks = self.tasks.write();
        let entry = tasks.get_mut(&task_id).ok_or_else(|| Error::Internal(format!("unknown task {task_id}")))?;
        entry.artifacts.push(artifact);
        Ok(())
    }

    pub fn fetch(&self, task_id: Uuid) -> Option<HydratedTask> {
        let tasks = self.tasks.read();
        let entry = tasks.get(&task_id)?;
        Some(HydratedTask { task: entry.task.clone(), steps: entry.steps.clone(), artifacts: entry.artifacts.clone() })
    }

    /// Deletes terminal tasks (and their steps/artifacts) older than
    /// `older_than`. Returns the number removed.
    pub fn prune(&self, now: DateTime<Utc>, older_than: chrono::Duration) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, entry| {
            if !entry.task.status.is_terminal() {
                return true;
            }
            match entry.task.ended_at {
                Some(ended) => now.signed_duration_since(ended) < older_than,
                None => true,
            }
        });
        before - tasks.len()
    }

    /// Force-fails tasks stuck RUNNING past their deadline (§4.3
    /// Timeouts). `deadline_seconds_for` computes the budget for a task
    /// from its `max_steps`.
    pub fn sweep_timeouts(&self, now: DateTime<Utc>, deadline_seconds_for: impl Fn(&Task) -> u64) -> Vec<Uuid> {
        let mut tasks = self.tasks.write();
        let mut timed_out = Vec::new();
        for entry in tasks.values_mut() {
            if entry.task.status != TaskStatus::Running {
                continue;
            }
            let Some(started) = entry.task.started_at else { continue };
            let deadline = deadline_seconds_for(&entry.task);
            let elapsed = now.signed_duration_since(started).num_seconds().max(0) as u64;
            if elapsed >= deadline {
                entry.task.status = TaskStatus::Failed;
                entry.task.ended_at = Some(now);
                entry.task.error_kind = Some(webagent_domain::error::ErrorKind::Timeout);
                timed_out.push(entry.task.task_id);
            }
        }
        timed_out
    }

    pub fn is_live(&self, task_id: Uuid) -> bool {
        self.tasks.read().contains_key(&task_id)
    }

    pub fn task_ids(&self) -> Vec<Uuid> {
        self.tasks.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_store_with_task() -> (TaskStore, Uuid) {
        let store = TaskStore::new();
        let task = store.create_task("browseWebAndReturnText", serde_json::json!({}), 5, ExecutionMode::Auto, true);
        (store, task.task_id)
    }

    #[test]
    fn create_task_starts_queued() {
        let (store, task_id) = new_store_with_task();
        assert_eq!(store.get(task_id).unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn legal_transition_succeeds() {
        let (store, task_id) = new_store_with_task();
        let task = store
            .transition(task_id, TaskStatus::Queued, TaskStatus::Running, |t| t.started_at = Some(Utc::now()))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let (store, task_id) = new_store_with_task();
        let err = store.transition(task_id, TaskStatus::Queued, TaskStatus::Completed, |_| {}).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
        assert_eq!(store.get(task_id).unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn cas_rejects_stale_from_status() {
        let (store, task_id) = new_store_with_task();
        store.transition(task_id, TaskStatus::Queued, TaskStatus::Running, |_| {}).unwrap();
        let err = store.transition(task_id, TaskStatus::Queued, TaskStatus::Cancelled, |_| {}).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { .. }));
    }

    #[test]
    fn record_and_update_step() {
        let (store, task_id) = new_store_with_task();
        store.record_step(task_id, StepRecord::pending(task_id, 1, "navigate".into())).unwrap();
        store.update_step(task_id, 1, |s| s.confidence = 0.9).unwrap();

        let hydrated = store.fetch(task_id).unwrap();
        assert_eq!(hydrated.steps[0].confidence, 0.9);
    }

    #[test]
    fn attach_artifact_appends() {
        let (store, task_id) = new_store_with_task();
        let artifact = Artifact::new(task_id, Some(1), webagent_domain::model::ArtifactKind::Screenshot, "/tmp/x.png".into(), 100);
        store.attach_artifact(task_id, artifact).unwrap();
        assert_eq!(store.fetch(task_id).unwrap().artifacts.len(), 1);
    }

    #[test]
    fn prune_removes_old_terminal_tasks_only() {
        let (store, task_id) = new_store_with_task();
        store.transition(task_id, TaskStatus::Queued, TaskStatus::Running, |_| {}).unwrap();
        store
            .transition(task_id, TaskStatus::Running, TaskStatus::Completed, |t| t.ended_at = Some(Utc::now() - chrono::Duration::hours(200)))
            .unwrap();

        let removed = store.prune(Utc::now(), chrono::Duration::hours(168));
        assert_eq!(removed, 1);
        assert!(store.get(task_id).is_none());
    }

    #[test]
    fn prune_keeps_non_terminal_tasks() {
        let (store, task_id) = new_store_with_task();
        let removed = store.prune(Utc::now(), chrono::Duration::seconds(0));
        assert_eq!(removed, 0);
        assert!(store.get(task_id).is_some());
    }

    #[test]
    fn sweep_timeouts_force_fails_stuck_tasks() {
        let (store, task_id) = new_store_with_task();
        store
            .transition(task_id, TaskStatus::Queued, TaskStatus::Running, |t| t.started_at = Some(Utc::now() - chrono::Duration::seconds(600)))
            .unwrap();

        let timed_out = store.sweep_timeouts(Utc::now(), |_| 60);
        assert_eq!(timed_out, vec![task_id]);
        let task = store.get(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_kind, Some(webagent_domain::error::ErrorKind::Timeout));
    }

    #[test]
    fn sweep_timeouts_ignores_tasks_within_budget() {
        let (store, task_id) = new_store_with_task();
        store.transition(task_id, TaskStatus::Queued, TaskStatus::Running, |t| t.started_at = Some(Utc::now())).unwrap();

        let timed_out = store.sweep_timeouts(Utc::now(), |_| 600);
        assert!(timed_out.is_empty());
    }
}
