//! Proctor Vision API Server
//!
//! REST server that checks exam webcam frames for face visibility and
//! captures persistent anomalies as evidence artifacts.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod dto;
pub mod error;
pub mod pipeline;
mod routes;

pub use config::Settings;
pub use error::{ApiError, ApiResult};
pub use pipeline::FrameOutcome;

use debounce::Monitor;
use storage::{ArtifactStore, FsArtifactStore, StorageError};
use visibility::{FaceLocator, VisibilityClassifier};

/// Application state shared across handlers.
///
/// Per-subject state lives in the monitor behind per-subject locks, so the
/// state itself is shared without an outer lock.
pub struct AppState {
    pub settings: Settings,
    pub classifier: VisibilityClassifier,
    pub monitor: Arc<Monitor>,
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Prometheus handle, if a recorder was installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    /// State with a filesystem artifact store rooted at `SUSPICIOUS_FRAMES_DIR`
    pub fn new(settings: Settings, locator: Arc<dyn FaceLocator>) -> Result<Self, StorageError> {
        let store = FsArtifactStore::new(&settings.suspicious_frames_dir)?;
        Ok(Self::with_store(settings, locator, Arc::new(store)))
    }

    pub fn with_store(
        settings: Settings,
        locator: Arc<dyn FaceLocator>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            classifier: VisibilityClassifier::new(settings.visibility_config(), locator),
            monitor: Arc::new(Monitor::new(settings.debounce_config())),
            artifacts,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            settings,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.body_limit_bytes();
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .route("/analyze-frame", post(routes::analyze::analyze_frame))
        .route("/test-detection", post(routes::analyze::test_detection))
        .route("/batch-analyze", post(routes::analyze::batch_analyze))
        .route("/check-student", post(routes::artifacts::check_student))
        .route("/get-frame/:student_id/:frame_name", get(routes::artifacts::get_frame))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Initialize logging. `format` is `text` or `json`.
pub fn init_logging(level: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" | "CRITICAL" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, draining requests");
}

/// Run the server until Ctrl-C
pub async fn run_server(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.settings.bind_addr();
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}
