use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event bus / SSE fan-out configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Bounded per-subscriber buffer size. Oldest events are dropped and
    /// replaced with a LAG marker once full; the producer never blocks.
    #[serde(default = "d_buffer_size")]
    pub event_buffer_size: usize,

    /// Heartbeat cadence when a subscription would otherwise be silent.
    #[serde(default = "d_heartbeat")]
    pub heartbeat_seconds: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: d_buffer_size(),
            heartbeat_seconds: d_heartbeat(),
        }
    }
}

fn d_buffer_size() -> usize {
    64
}
fn d_heartbeat() -> u64 {
    15
}
