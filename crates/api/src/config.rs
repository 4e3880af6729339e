//! Server settings
//!
//! Loaded from environment variables (`API_PORT`, `FRAME_SAVE_COOLDOWN`, ...)
//! layered over the defaults below.

use config::{Config, ConfigError, Environment};
use debounce::DebounceConfig;
use serde::{Deserialize, Serialize};
use visibility::{DetectorTuning, VisibilityConfig};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_host: String,
    pub api_port: u16,
    pub debug_mode: bool,

    /// Artifact root directory
    pub suspicious_frames_dir: String,

    pub face_visibility_threshold: f64,
    pub edge_margin_pixels: u32,

    /// Seconds between captures for the same subject
    pub frame_save_cooldown: f64,
    /// Seconds an anomaly must persist before capture
    pub min_suspicious_duration: f64,
    /// Classify every Nth frame per subject (1 = all frames)
    pub frame_process_interval: u32,

    pub min_face_size: u32,
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub face_model_path: String,

    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,

    /// Cap on a single base64 frame payload
    pub max_frame_size_mb: f64,
    pub max_batch_size: usize,
    /// `*` or a comma separated list of origins
    pub allowed_origins: String,

    /// Upper bound on one artifact write
    pub artifact_write_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 5000,
            debug_mode: false,
            suspicious_frames_dir: "suspicious_frames".to_string(),
            face_visibility_threshold: 0.08,
            edge_margin_pixels: 5,
            frame_save_cooldown: 5.0,
            min_suspicious_duration: 1.0,
            frame_process_interval: 1,
            min_face_size: 40,
            scale_factor: 1.1,
            min_neighbors: 3,
            face_model_path: "models/seeta_fd_frontal_v1.0.bin".to_string(),
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            max_frame_size_mb: 5.0,
            max_batch_size: 100,
            allowed_origins: "*".to_string(),
            artifact_write_timeout_ms: 2000,
        }
    }
}

/// Configuration echo for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub face_visibility_threshold: f64,
    pub edge_margin_pixels: u32,
    pub frame_save_cooldown: f64,
    pub min_suspicious_duration: f64,
    pub frame_process_interval: u32,
    pub max_frame_size_mb: f64,
    pub max_batch_size: usize,
    pub log_level: String,
}

impl Settings {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Defaults overridden by the given environment source
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.face_visibility_threshold > 0.0 && self.face_visibility_threshold <= 1.0) {
            return Err(ConfigError::Message(format!(
                "FACE_VISIBILITY_THRESHOLD must be in (0, 1], got {}",
                self.face_visibility_threshold
            )));
        }
        if self.frame_save_cooldown < 0.0 || self.min_suspicious_duration < 0.0 {
            return Err(ConfigError::Message(
                "FRAME_SAVE_COOLDOWN and MIN_SUSPICIOUS_DURATION must not be negative".into(),
            ));
        }
        if self.scale_factor <= 1.0 {
            return Err(ConfigError::Message(format!(
                "SCALE_FACTOR must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.max_frame_size_mb <= 0.0 {
            return Err(ConfigError::Message("MAX_FRAME_SIZE_MB must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn visibility_config(&self) -> VisibilityConfig {
        VisibilityConfig {
            coverage_threshold: self.face_visibility_threshold,
            edge_margin_pixels: self.edge_margin_pixels,
            detector: DetectorTuning {
                min_face_size: self.min_face_size,
                scale_factor: self.scale_factor,
                min_neighbors: self.min_neighbors,
                model_path: Some(self.face_model_path.clone()),
            },
        }
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig {
            save_cooldown_secs: self.frame_save_cooldown,
            min_persistence_secs: self.min_suspicious_duration,
            sample_interval: self.frame_process_interval.max(1),
        }
    }

    /// Whether a base64 payload exceeds the per-frame cap
    pub fn frame_too_large(&self, payload: &str) -> bool {
        payload.len() as f64 / BYTES_PER_MB > self.max_frame_size_mb
    }

    /// Request body limit: a full batch of maximum-size frames plus JSON overhead
    pub fn body_limit_bytes(&self) -> usize {
        let frame = (self.max_frame_size_mb * BYTES_PER_MB) as usize;
        frame.saturating_mul(self.max_batch_size.max(1)).saturating_add(1 << 20)
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            host: self.api_host.clone(),
            port: self.api_port,
            debug: self.debug_mode,
            face_visibility_threshold: self.face_visibility_threshold,
            edge_margin_pixels: self.edge_margin_pixels,
            frame_save_cooldown: self.frame_save_cooldown,
            min_suspicious_duration: self.min_suspicious_duration,
            frame_process_interval: self.frame_process_interval,
            max_frame_size_mb: self.max_frame_size_mb,
            max_batch_size: self.max_batch_size,
            log_level: self.log_level.clone(),
        }
    }
}
