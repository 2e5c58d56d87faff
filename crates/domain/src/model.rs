//! Core data model: Tool, ToolDescription, Task, StepRecord, Artifact.
//!
//! These types are the wire and storage shape shared by the registry,
//! browser, artifacts, and gateway crates. None of them carry behavior
//! beyond small invariant-preserving constructors — the stores that own
//! them (in `webagent-gateway::runtime` and `webagent-registry`) enforce
//! the lifecycle rules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionCapability {
    OneShot,
    MultiStep,
}

/// A single parameter in a tool's input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// A declared tool, as registered at startup. Immutable after registry init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: HashMap<String, ParamSpec>,
    pub capabilities: Vec<ExecutionCapability>,
    /// Set when this tool's description came from a fallback, not the generator.
    #[serde(default)]
    pub description_degraded: bool,
}

impl ToolInfo {
    pub fn is_one_shot_only(&self) -> bool {
        self.capabilities == [ExecutionCapability::OneShot]
    }
}

/// Validates a tool name against `^[A-Za-z][A-Za-z0-9_]{0,63}$`.
pub fn is_valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolDescription
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A cached, possibly LLM-generated, description of a tool under a given
/// provider model. Keyed by `(provider_model, tool_name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescription {
    pub provider_model: String,
    pub tool_name: String,
    pub description: String,
    pub parameters_info: String,
    pub generation_time_ms: u64,
    /// Written but intentionally not read by any ranking/eviction logic;
    /// see the quality_score Open Question.
    #[serde(default = "default_quality_score")]
    pub quality_score: u8,
    #[serde(default)]
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

fn default_quality_score() -> u8 {
    5
}

impl ToolDescription {
    pub fn new(provider_model: &str, tool_name: &str, description: String, parameters_info: String, generation_time_ms: u64) -> Self {
        let now = Utc::now();
        Self {
            provider_model: provider_model.to_owned(),
            tool_name: tool_name.to_owned(),
            description,
            parameters_info,
            generation_time_ms,
            quality_score: default_quality_score(),
            usage_count: 0,
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn cache_key(provider_model: &str, tool_name: &str) -> String {
        format!("{provider_model}::{tool_name}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Whether `self -> to` is an allowed lifecycle edge (§4.3).
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Queued, Running) | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    OneShot,
    MultiStep,
    Auto,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: TaskStatus,
    pub max_steps: u32,
    pub execution_mode: ExecutionMode,
    pub allow_early_completion: bool,
    pub current_step: u32,
    pub total_steps_planned: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result_summary: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl Task {
    pub fn new(
        tool_name: &str,
        arguments: serde_json::Value,
        max_steps: u32,
        execution_mode: ExecutionMode,
        allow_early_completion: bool,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            tool_name: tool_name.to_owned(),
            arguments,
            status: TaskStatus::Queued,
            max_steps,
            execution_mode,
            allow_early_completion,
            current_step: 0,
            total_steps_planned: 0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            result_summary: None,
            error_kind: None,
        }
    }

    /// Loopy tasks (`max_steps > 1`) run asynchronously; everything else
    /// is a one-shot, synchronous call per §4.2.
    pub fn is_loopy(&self) -> bool {
        self.max_steps > 1 && self.execution_mode != ExecutionMode::OneShot
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StepRecord
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// `(current_url, page_title)` snapshot, enough to resume the next step
/// on the same page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserState {
    pub current_url: String,
    pub page_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub task_id: Uuid,
    pub step_number: u32,
    pub description: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub confidence: f32,
    pub result_text: Option<String>,
    pub artifact_ids: Vec<Uuid>,
    pub browser_state: Option<BrowserState>,
    pub error_kind: Option<ErrorKind>,
}

impl StepRecord {
    pub fn pending(task_id: Uuid, step_number: u32, description: String) -> Self {
        Self {
            task_id,
            step_number,
            description,
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            confidence: 0.0,
            result_text: None,
            artifact_ids: Vec::new(),
            browser_state: None,
            error_kind: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Artifact
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Screenshot,
    ExtractedText,
    ErrorBlob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: Uuid,
    pub task_id: Uuid,
    pub step_number: Option<u32>,
    pub kind: ArtifactKind,
    pub content_ref: String,
    pub public_url: Option<String>,
    pub bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(task_id: Uuid, step_number: Option<u32>, kind: ArtifactKind, content_ref: String, bytes: u64) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            task_id,
            step_number,
            kind,
            content_ref,
            public_url: None,
            bytes,
            width: None,
            height: None,
            quality_score: None,
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One benchmark instruction within an `EvaluationSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalTaskSpec {
    pub instruction: String,
    pub max_steps: u32,
    /// Substrings expected to appear somewhere in the run's step results;
    /// each match contributes to the task's score.
    #[serde(default)]
    pub expected_signals: Vec<String>,
}

/// A named set of benchmark instructions to run against the same
/// Executor pipeline under one provider model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSpec {
    pub eval_id: Uuid,
    pub model_id: String,
    pub tasks: Vec<EvalTaskSpec>,
}

impl EvaluationSpec {
    pub fn new(model_id: &str, tasks: Vec<EvalTaskSpec>) -> Self {
        Self { eval_id: Uuid::new_v4(), model_id: model_id.to_owned(), tasks }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }
}

/// The outcome of running one `EvalTaskSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalTaskResult {
    pub task_id: Option<Uuid>,
    pub status: TaskStatus,
    pub steps_completed: u32,
    pub duration_ms: u64,
    /// 0-100, weighted by completion, average step confidence, and
    /// expected-signal matches.
    pub score: f32,
}

/// The persisted, linked record for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub eval_id: Uuid,
    pub model_id: String,
    pub status: EvaluationStatus,
    pub tasks: Vec<EvalTaskSpec>,
    pub results: Vec<EvalTaskResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Mean of `results[..].score`; `None` until at least one task finishes.
    pub average_score: Option<f32>,
}

impl EvaluationRecord {
    pub fn new(spec: EvaluationSpec) -> Self {
        Self {
            eval_id: spec.eval_id,
            model_id: spec.model_id,
            status: EvaluationStatus::Queued,
            tasks: spec.tasks,
            results: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            average_score: None,
        }
    }
}

/// Score one task run 0-100: 50% task-level completion, 25% mean step
/// confidence, 25% fraction of `expected_signals` found in step results.
pub fn score_eval_task(status: TaskStatus, mean_confidence: f32, expected_signals: &[String], step_texts: &[String]) -> f32 {
    let completion = if status == TaskStatus::Completed { 1.0 } else { 0.0 };

    let signal_match = if expected_signals.is_empty() {
        1.0
    } else {
        let haystack = step_texts.join(" ").to_lowercase();
        let hits = expected_signals.iter().filter(|s| haystack.contains(&s.to_lowercase())).count();
        hits as f32 / expected_signals.len() as f32
    };

    (completion * 0.5 + mean_confidence.clamp(0.0, 1.0) * 0.25 + signal_match * 0.25) * 100.0
}
