//! Per-task cancellation tokens, checked by the orchestrator between
//! steps and by the executor at waitable points (§4.6 Cancellation).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one cancel token per in-flight task.
pub struct CancelMap {
    tokens: Mutex<HashMap<Uuid, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self { tokens: Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, task_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(task_id, token.clone());
        token
    }

    /// Like `register`, but reuses an already-registered token instead of
    /// replacing it. Lets a cancel request that arrives between task
    /// creation and orchestrator pickup still take effect.
    pub fn ensure(&self, task_id: Uuid) -> CancelToken {
        self.tokens.lock().entry(task_id).or_insert_with(CancelToken::new).clone()
    }

    pub fn cancel(&self, task_id: Uuid) -> bool {
        if let Some(token) = self.tokens.lock().get(&task_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub fn remove(&self, task_id: Uuid) {
        self.tokens.lock().remove(&task_id);
    }

    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.tokens.lock().contains_key(&task_id)
    }
}
