//! Event Bus & SSE Fan-out (§4.8): per-task broadcast of progress events
//! to any number of subscribers, with bounded per-subscription buffers
//! and a `LAG` marker on overflow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;
use webagent_domain::error::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskEvent {
    TaskQueued { task_id: Uuid, tool_name: String, max_steps: u32, created_at: DateTime<Utc> },
    TaskStarted { task_id: Uuid, started_at: DateTime<Utc>, planned_steps: u32 },
    StepStarted { task_id: Uuid, step_number: u32, description: String },
    StepCompleted {
        task_id: Uuid,
        step_number: u32,
        confidence: f32,
        result_summary: Option<String>,
        duration_ms: u64,
        artifact_refs: Vec<Uuid>,
    },
    StepFailed { task_id: Uuid, step_number: u32, error_kind: ErrorKind, message: String },
    ScreenshotCaptured { task_id: Uuid, step_number: u32, artifact_id: Uuid, public_url: String },
    TaskEnded {
        task_id: Uuid,
        terminal_status: String,
        ended_at: DateTime<Utc>,
        steps_completed: u32,
        early_completion: bool,
    },
    Heartbeat { task_id: Uuid, now: DateTime<Utc> },
}

impl TaskEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::TaskQueued { task_id, .. }
            | TaskEvent::TaskStarted { task_id, .. }
            | TaskEvent::StepStarted { task_id, .. }
            | TaskEvent::StepCompleted { task_id, .. }
            | TaskEvent::StepFailed { task_id, .. }
            | TaskEvent::ScreenshotCaptured { task_id, .. }
            | TaskEvent::TaskEnded { task_id, .. }
            | TaskEvent::Heartbeat { task_id, .. } => *task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::TaskEnded { .. })
    }
}

/// A dispatched event plus its per-task sequence number. `None` means
/// this slot is a `LAG` marker: the subscriber's buffer overflowed and
/// one or more events before `sequence` were dropped.
#[derive(Debug, Clone)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: Option<TaskEvent>,
}

struct TaskChannel {
    sender: broadcast::Sender<SequencedEvent>,
    next_sequence: u64,
}

/// Fan-out bus: one broadcast channel per task, created lazily on first
/// `publish` or `subscribe` and torn down by the caller once the task is
/// terminal and drained.
pub struct EventBus {
    channels: RwLock<HashMap<Uuid, TaskChannel>>,
    buffer_size: usize,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self { channels: RwLock::new(HashMap::new()), buffer_size: buffer_size.max(1) }
    }

    fn channel_sender(&self, task_id: Uuid) -> broadcast::Sender<SequencedEvent> {
        if let Some(chan) = self.channels.read().get(&task_id) {
            return chan.sender.clone();
        }
        let mut channels = self.channels.write();
        channels
            .entry(task_id)
            .or_insert_with(|| TaskChannel { sender: broadcast::channel(self.buffer_size).0, next_sequence: 0 })
            .sender
            .clone()
    }

    /// Publishes an event, stamping it with the next sequence number for
    /// its task. Never blocks: `broadcast::Sender::send` only fails when
    /// there are no receivers, which is not an error here.
    pub fn publish(&self, event: TaskEvent) -> u64 {
        let task_id = event.task_id();
        let mut channels = self.channels.write();
        let chan = channels
            .entry(task_id)
            .or_insert_with(|| TaskChannel { sender: broadcast::channel(self.buffer_size).0, next_sequence: 0 });
        let sequence = chan.next_sequence;
        chan.next_sequence += 1;
        let _ = chan.sender.send(SequencedEvent { sequence, event: Some(event) });
        sequence
    }

    pub fn subscribe(&self, task_id: Uuid) -> broadcast::Receiver<SequencedEvent> {
        self.channel_sender(task_id).subscribe()
    }

    /// Drops the channel for a task. Subscribers already holding a
    /// receiver keep draining buffered events; new subscribers after
    /// this point get a fresh, empty channel.
    pub fn close(&self, task_id: Uuid) {
        self.channels.write().remove(&task_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Wraps a raw broadcast receiver with `Lagged`-to-`LAG`-marker translation,
/// the shape consumed directly by the SSE handler.
pub async fn recv_or_lag(rx: &mut broadcast::Receiver<SequencedEvent>) -> Option<SequencedEvent> {
    loop {
        match rx.recv().await {
            Ok(seq_event) => return Some(seq_event),
            Err(broadcast::error::RecvError::Lagged(_)) => {
                return Some(SequencedEvent { sequence: 0, event: None });
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_assigns_monotonic_sequence_per_task() {
        let bus = EventBus::new(64);
        let task_id = Uuid::new_v4();
        let mut rx = bus.subscribe(task_id);

        let s0 = bus.publish(TaskEvent::TaskQueued { task_id, tool_name: "x".into(), max_steps: 1, created_at: Utc::now() });
        let s1 = bus.publish(TaskEvent::TaskStarted { task_id, started_at: Utc::now(), planned_steps: 1 });
        assert_eq!((s0, s1), (0, 1));

        assert_eq!(rx.try_recv().unwrap().sequence, 0);
        assert_eq!(rx.try_recv().unwrap().sequence, 1);
    }

    #[test]
    fn distinct_tasks_have_independent_sequences() {
        let bus = EventBus::new(64);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        bus.publish(TaskEvent::TaskQueued { task_id: a, tool_name: "x".into(), max_steps: 1, created_at: Utc::now() });
        let seq_b = bus.publish(TaskEvent::TaskQueued { task_id: b, tool_name: "y".into(), max_steps: 1, created_at: Utc::now() });
        assert_eq!(seq_b, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_sees_a_lag_marker() {
        let bus = EventBus::new(2);
        let task_id = Uuid::new_v4();
        let mut rx = bus.subscribe(task_id);

        for step in 0..5u32 {
            bus.publish(TaskEvent::StepStarted { task_id, step_number: step, description: "x".into() });
        }

        let seq_event = recv_or_lag(&mut rx).await.expect("receiver still open");
        assert!(seq_event.event.is_none(), "expected a LAG marker after overflow, got {seq_event:?}");
    }

    #[tokio::test]
    async fn recv_or_lag_returns_none_after_close() {
        let bus = EventBus::new(8);
        let task_id = Uuid::new_v4();
        let mut rx = bus.subscribe(task_id);
        bus.close(task_id);
        drop(bus);

        assert!(recv_or_lag(&mut rx).await.is_none());
    }

    #[test]
    fn task_ended_is_terminal() {
        let event = TaskEvent::TaskEnded {
            task_id: Uuid::new_v4(),
            terminal_status: "COMPLETED".into(),
            ended_at: Utc::now(),
            steps_completed: 3,
            early_completion: true,
        };
        assert!(event.is_terminal());
    }
}
