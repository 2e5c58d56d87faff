use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser session / orchestrator configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Process-wide cap on concurrent browser sessions (one-shot calls
    /// and loopy task orchestration share this semaphore).
    #[serde(default = "d_max_sessions")]
    pub max_concurrent_browser_sessions: usize,

    /// Per-step deadline. NAVIGATE/CLICK/TYPE/WAIT/SCREENSHOT all inherit
    /// this unless the step carries its own timeout override.
    #[serde(default = "d_step_timeout")]
    pub per_step_timeout_seconds: u64,

    /// Added to `max_steps * per_step_timeout_seconds` to derive a task's
    /// overall deadline before the sweeper force-fails it.
    #[serde(default = "d_grace")]
    pub task_grace_seconds: u64,

    /// Moving-average confidence threshold for AUTO early completion.
    #[serde(default = "d_confidence")]
    pub early_completion_confidence: f32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_concurrent_browser_sessions: d_max_sessions(),
            per_step_timeout_seconds: d_step_timeout(),
            task_grace_seconds: d_grace(),
            early_completion_confidence: d_confidence(),
        }
    }
}

impl BrowserConfig {
    /// Clamp the session cap to a sane operational range.
    pub fn clamped(&self) -> Self {
        Self {
            max_concurrent_browser_sessions: self.max_concurrent_browser_sessions.clamp(1, 50),
            per_step_timeout_seconds: self.per_step_timeout_seconds.clamp(1, 600),
            task_grace_seconds: self.task_grace_seconds.clamp(0, 600),
            early_completion_confidence: self.early_completion_confidence.clamp(0.0, 1.0),
        }
    }

    /// Overall per-task deadline per §5: `max_steps * per_step_timeout + grace`.
    pub fn task_deadline_seconds(&self, max_steps: u32) -> u64 {
        (max_steps as u64) * self.per_step_timeout_seconds + self.task_grace_seconds
    }
}

fn d_max_sessions() -> usize {
    5
}
fn d_step_timeout() -> u64 {
    30
}
fn d_grace() -> u64 {
    30
}
fn d_confidence() -> f32 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = BrowserConfig::default();
        assert_eq!(cfg.max_concurrent_browser_sessions, 5);
        assert_eq!(cfg.per_step_timeout_seconds, 30);
        assert_eq!(cfg.task_grace_seconds, 30);
        assert!((cfg.early_completion_confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn clamp_sessions_floor_and_ceiling() {
        let low = BrowserConfig { max_concurrent_browser_sessions: 0, ..BrowserConfig::default() };
        assert_eq!(low.clamped().max_concurrent_browser_sessions, 1);
        let high = BrowserConfig { max_concurrent_browser_sessions: 999, ..BrowserConfig::default() };
        assert_eq!(high.clamped().max_concurrent_browser_sessions, 50);
    }

    #[test]
    fn clamp_confidence_into_unit_range() {
        let over = BrowserConfig { early_completion_confidence: 1.5, ..BrowserConfig::default() };
        assert!((over.clamped().early_completion_confidence - 1.0).abs() < f32::EPSILON);
        let under = BrowserConfig { early_completion_confidence: -0.3, ..BrowserConfig::default() };
        assert!((under.clamped().early_completion_confidence - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn task_deadline_matches_formula() {
        let cfg = BrowserConfig::default();
        assert_eq!(cfg.task_deadline_seconds(5), 5 * 30 + 30);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: BrowserConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.max_concurrent_browser_sessions, 5);
    }
}
