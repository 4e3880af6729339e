//! Proctor Vision - Main Entry Point

use std::sync::Arc;

use api::{init_logging, run_server, AppState, Settings};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use visibility::RustfaceLocator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(&settings.log_level, &settings.log_format)?;

    info!("=== Proctor Vision v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", settings.bind_addr());
    info!("Artifact root: {}", settings.suspicious_frames_dir);
    info!(
        "Sample interval: {}, cooldown: {}s, persistence: {}s",
        settings.frame_process_interval, settings.frame_save_cooldown, settings.min_suspicious_duration
    );

    // Without a detector there is nothing to serve
    let locator = RustfaceLocator::new(&settings.visibility_config().detector)?;

    let mut state = AppState::new(settings, Arc::new(locator))?;
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("Metrics exporter unavailable: {}", e),
    }

    run_server(Arc::new(state)).await?;

    Ok(())
}
