//! Evaluation Harness (§4.9): the store backing named benchmark runs,
//! plus the background sweeper that promotes QUEUED evaluations to
//! RUNNING and drives each contained instruction through the same
//! Orchestrator pipeline a regular task uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;
use webagent_domain::error::{Error, Result};
use webagent_domain::model::{score_eval_task, EvalTaskResult, EvaluationRecord, EvaluationSpec, EvaluationStatus, ExecutionMode, TaskStatus};

use super::orchestrator::Orchestrator;
use super::task_store::TaskStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_CONCURRENCY: usize = 3;

pub struct EvaluationStore {
    records: RwLock<HashMap<Uuid, EvaluationRecord>>,
}

impl Default for EvaluationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationStore {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    pub fn submit(&self, spec: EvaluationSpec) -> EvaluationRecord {
        let record = EvaluationRecord::new(spec);
        self.records.write().insert(record.eval_id, record.clone());
        record
    }

    pub fn get(&self, eval_id: Uuid) -> Option<EvaluationRecord> {
        self.records.read().get(&eval_id).cloned()
    }

    fn queued_ids(&self) -> Vec<Uuid> {
        self.records.read().values().filter(|r| r.status == EvaluationStatus::Queued).map(|r| r.eval_id).collect()
    }

    fn transition(&self, eval_id: Uuid, from: EvaluationStatus, apply: impl FnOnce(&mut EvaluationRecord)) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&eval_id).ok_or_else(|| Error::Internal(format!("unknown evaluation {eval_id}")))?;
        if record.status != from {
            return Err(Error::IllegalTransition { from: format!("{:?}", record.status), to: "RUNNING".into() });
        }
        apply(record);
        Ok(())
    }

    fn push_result(&self, eval_id: Uuid, result: EvalTaskResult) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(&eval_id) {
            record.results.push(result);
        }
    }

    fn finish(&self, eval_id: Uuid) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(&eval_id) {
            let scores: Vec<f32> = record.results.iter().map(|r| r.score).collect();
            record.average_score = if scores.is_empty() { None } else { Some(scores.iter().sum::<f32>() / scores.len() as f32) };
            record.status = if record.results.iter().all(|r| r.status == TaskStatus::Completed) { EvaluationStatus::Completed } else { EvaluationStatus::Failed };
            record.ended_at = Some(Utc::now());
        }
    }
}

/// Spawns the evaluation sweeper: every `SWEEP_INTERVAL`, claims up to
/// `DEFAULT_CONCURRENCY` QUEUED evaluations and runs them to completion,
/// one at a time per evaluation, reusing the task Orchestrator.
pub fn spawn_evaluation_sweeper(eval_store: Arc<EvaluationStore>, task_store: Arc<TaskStore>, orchestrator: Arc<Orchestrator>) {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(DEFAULT_CONCURRENCY));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            for eval_id in eval_store.queued_ids() {
                let eval_store = eval_store.clone();
                let task_store = task_store.clone();
                let orchestrator = orchestrator.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else { return };
                    run_evaluation(eval_store, task_store, orchestrator, eval_id).await;
                });
            }
        }
    });
}

async fn run_evaluation(eval_store: Arc<EvaluationStore>, task_store: Arc<TaskStore>, orchestrator: Arc<Orchestrator>, eval_id: Uuid) {
    let transitioned = eval_store.transition(eval_id, EvaluationStatus::Queued, |r| {
        r.status = EvaluationStatus::Running;
        r.started_at = Some(Utc::now());
    });
    if transitioned.is_err() {
        return;
    }

    let Some(record) = eval_store.get(eval_id) else { return };

    for eval_task in &record.tasks {
        let task = task_store.create_task("browseWeb", serde_json::json!({ "instructions": eval_task.instruction }), eval_task.max_steps, ExecutionMode::Auto, true);
        orchestrator.spawn(task.task_id, eval_task.instruction.clone());

        loop {
            match task_store.get(task.task_id) {
                Some(t) if t.status.is_terminal() => break,
                Some(_) => tokio::time::sleep(POLL_INTERVAL).await,
                None => break,
            }
        }

        let Some(hydrated) = task_store.fetch(task.task_id) else {
            eval_store.push_result(eval_id, EvalTaskResult { task_id: Some(task.task_id), status: TaskStatus::Failed, steps_completed: 0, duration_ms: 0, score: 0.0 });
            continue;
        };

        let completed_steps: Vec<_> = hydrated.steps.iter().filter(|s| s.status == webagent_domain::model::StepStatus::Completed).collect();
        let mean_confidence = if completed_steps.is_empty() { 0.0 } else { completed_steps.iter().map(|s| s.confidence).sum::<f32>() / completed_steps.len() as f32 };
        let step_texts: Vec<String> = hydrated.steps.iter().filter_map(|s| s.result_text.clone()).collect();
        let duration_ms = match (hydrated.task.started_at, hydrated.task.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            _ => 0,
        };

        let score = score_eval_task(hydrated.task.status, mean_confidence, &eval_task.expected_signals, &step_texts);
        eval_store.push_result(
            eval_id,
            EvalTaskResult { task_id: Some(task.task_id), status: hydrated.task.status, steps_completed: hydrated.task.current_step, duration_ms, score },
        );
    }

    eval_store.finish(eval_id);
}
