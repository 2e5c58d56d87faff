use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability (OpenTelemetry) configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trace export configuration. Independent of the `tracing`/JSON logging
/// that always runs: every request handler, orchestrator loop iteration,
/// and browser action opens a span carrying `task_id`/`step_number`, and
/// this config only controls whether those spans are *also* shipped to
/// a collector over OTLP/gRPC.
///
/// `otlp_endpoint: None` (the default) keeps the process log-only, which
/// is the right default for a single-instance local run — there's
/// nothing to correlate traces across. Set it once task runs need to be
/// traced across a dashboard/collector rather than read from stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// OTLP gRPC collector endpoint (e.g. `http://localhost:4317`).
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// The `service.name` resource attribute reported on every exported
    /// span, letting a collector tell this process apart from whatever
    /// else feeds it.
    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Trace sampling rate (`0.0` = never, `1.0` = always), applied with
    /// `TraceIdRatioBased` sampling so every span within one task's trace
    /// makes the same keep/drop decision.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

impl ObservabilityConfig {
    /// Whether the OTLP exporter should be started at all. A present but
    /// empty endpoint is treated as disabled, since an empty TOML string
    /// is a common accidental override.
    pub fn is_otlp_enabled(&self) -> bool {
        self.otlp_endpoint.as_deref().is_some_and(|e| !e.is_empty())
    }
}

fn d_service_name() -> String {
    "webagentd".into()
}

fn d_sample_rate() -> f64 {
    1.0
}
