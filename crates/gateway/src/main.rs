use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use webagent_browser::{BrowserDriver, HeuristicDecomposer, NoopDriver, StepDecomposer};
use webagent_domain::config::{Config, CorsConfig};
use webagent_registry::{DescriptionCache, StaticGenerator, ToolRegistry};

use webagent_artifacts::{ArtifactStore, ScreenshotPipeline};
use webagent_gateway::api;
use webagent_gateway::runtime::sweep::{spawn_retention_sweeper, spawn_timeout_sweeper};
use webagent_gateway::runtime::{spawn_evaluation_sweeper, CancelMap, EvaluationStore, EventBus, Orchestrator, TaskStore};
use webagent_gateway::state::AppState;
use webagent_gateway::tools;

#[derive(Parser, Debug)]
#[command(name = "webagentd", about = "Task execution core for an AI-agent web-automation server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(_) => {
            eprintln!("no config file at {}, starting with defaults", cli.config.display());
            Config::default()
        }
    };
    let config = Arc::new(config);

    init_tracing(cli.log_format, &config.observability)?;

    run_server(config).await
}

fn init_tracing(format: LogFormat, observability: &webagent_domain::config::ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,webagent_gateway=debug"));

    let fmt_layer = if format == LogFormat::Json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    match observability.is_otlp_enabled().then(|| observability.otlp_endpoint.as_deref().unwrap()) {
        Some(endpoint) => {
            use opentelemetry::KeyValue;
            use opentelemetry_otlp::WithExportConfig;
            use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
            use opentelemetry_sdk::Resource;

            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .context("building OTLP exporter")?;

            let resource = Resource::builder_empty().with_attributes(vec![KeyValue::new("service.name", observability.service_name.clone())]).build();

            let provider = SdkTracerProvider::builder()
                .with_resource(resource)
                .with_sampler(Sampler::TraceIdRatioBased(observability.sample_rate))
                .with_batch_exporter(exporter)
                .build();

            opentelemetry::global::set_tracer_provider(provider);
            let tracer = opentelemetry::global::tracer("webagentd");

            registry.with(tracing_opentelemetry::layer().with_tracer(tracer)).try_init().context("initializing tracing subscriber with OTLP export")?;
        }
        None => {
            registry.try_init().context("initializing tracing subscriber")?;
        }
    }

    Ok(())
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("webagentd starting");

    // ── Browser driver (external collaborator) ───────────────────────
    let driver: Arc<dyn BrowserDriver> = Arc::new(NoopDriver);
    tracing::info!("browser driver ready (no-op placeholder, plug in a CDP client for real navigation)");

    // ── Tool registry ──────────────────────────────────────────────────
    let description_cache = DescriptionCache::open(None);
    if !config.registry.description_cache_enabled {
        tracing::info!("description cache disabled by config");
    }
    let generator = StaticGenerator::new("Runs the {tool} tool.");

    // ── Browser decomposer ───────────────────────────────────────────
    let decomposer: Arc<dyn StepDecomposer> = Arc::new(HeuristicDecomposer::new());

    let registrations = tools::registrations(driver.clone(), decomposer.clone(), config.browser.clamped().per_step_timeout_seconds);
    let registry = ToolRegistry::build(registrations, &description_cache, &generator, &config.registry.current_model_id).await;
    for err in registry.init_errors() {
        tracing::warn!(tool = %err.tool_name, reason = %err.message, "tool registered with a degraded description");
    }
    tracing::info!(tools = registry.list().len(), "tool registry ready");

    // ── Screenshot pipeline ──────────────────────────────────────────
    let artifact_store = Arc::new(ArtifactStore::new(config.artifacts.screenshots_dir.clone()));
    let base_url = format!("http://{}:{}", config.server.host, config.server.port);
    let screenshot_pipeline = Arc::new(ScreenshotPipeline::new(artifact_store.clone(), base_url));
    tracing::info!(dir = %config.artifacts.screenshots_dir, "screenshot pipeline ready");

    // ── Task runtime ─────────────────────────────────────────────────
    let task_store = Arc::new(TaskStore::new());
    let event_bus = Arc::new(EventBus::new(config.events.event_buffer_size));
    let cancel_map = Arc::new(CancelMap::new());
    let orchestrator = Arc::new(Orchestrator::new(
        task_store.clone(),
        event_bus.clone(),
        cancel_map.clone(),
        driver.clone(),
        decomposer.clone(),
        screenshot_pipeline.clone(),
        config.browser.clone(),
    ));
    tracing::info!(max_sessions = config.browser.clamped().max_concurrent_browser_sessions, "task runtime ready");

    spawn_timeout_sweeper(task_store.clone(), event_bus.clone(), config.browser.clone());
    spawn_retention_sweeper(artifact_store.clone(), task_store.clone(), config.artifacts.clone());

    let evaluation_store = Arc::new(EvaluationStore::new());
    spawn_evaluation_sweeper(evaluation_store.clone(), task_store.clone(), orchestrator.clone());
    tracing::info!("background sweepers started");

    // ── App state ────────────────────────────────────────────────────
    let state = AppState::new(
        config.clone(),
        Arc::new(registry),
        Arc::new(description_cache),
        driver,
        decomposer,
        artifact_store,
        screenshot_pipeline,
        task_store,
        event_bus,
        cancel_map,
        orchestrator,
        evaluation_store,
    );

    // ── Router ───────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let app = api::router(state.clone()).layer(cors_layer).with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "webagentd listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard port (e.g. `http://localhost:*`); a
/// literal `"*"` allows all origins (not recommended for production).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str.strip_prefix(prefix.as_str()).map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())).unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
