//! API and session configuration.

use std::path::PathBuf;
use std::str::FromStr;

use vsess_media::ToolkitTimeouts;
use vsess_models::EncodingConfig;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Whether `/metrics` is served
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 50,
            max_body_size: 2 * 1024 * 1024 * 1024, // 2GB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_or("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_or("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            max_body_size: env_or("MAX_BODY_SIZE", defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: env_flag("METRICS_ENABLED", defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}

/// Whether the process environment names a production deployment.
///
/// Used where no [`ApiConfig`] is at hand, such as error rendering.
pub fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|v| is_production(&v))
        .unwrap_or(false)
}

fn is_production(environment: &str) -> bool {
    environment.trim().eq_ignore_ascii_case("production")
}

/// Configuration of the session service: storage, FFmpeg limits and encoding.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root directory for uploads, staging and artifacts
    pub storage_root: PathBuf,
    pub probe_timeout_secs: u64,
    pub frame_timeout_secs: u64,
    pub transform_timeout_secs: u64,
    /// Transforms allowed to encode at the same time
    pub max_concurrent_transforms: usize,
    /// Uploads narrower than this are rejected
    pub min_video_width: u32,
    /// Uploads shorter than this are rejected
    pub min_video_height: u32,
    pub output_crf: u8,
    pub output_preset: String,
    /// Re-register stored uploads on startup
    pub restore_on_startup: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./uploads"),
            probe_timeout_secs: 30,
            frame_timeout_secs: 30,
            transform_timeout_secs: 1800, // 30 minutes
            max_concurrent_transforms: 2,
            min_video_width: 1,
            min_video_height: 1,
            output_crf: 18,
            output_preset: "fast".to_string(),
            restore_on_startup: true,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_root: std::env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            probe_timeout_secs: env_or("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            frame_timeout_secs: env_or("FRAME_TIMEOUT_SECS", defaults.frame_timeout_secs),
            transform_timeout_secs: env_or("TRANSFORM_TIMEOUT_SECS", defaults.transform_timeout_secs),
            max_concurrent_transforms: env_or(
                "MAX_CONCURRENT_TRANSFORMS",
                defaults.max_concurrent_transforms,
            )
            .max(1),
            min_video_width: env_or("MIN_VIDEO_WIDTH", defaults.min_video_width),
            min_video_height: env_or("MIN_VIDEO_HEIGHT", defaults.min_video_height),
            output_crf: env_or("OUTPUT_CRF", defaults.output_crf),
            output_preset: std::env::var("OUTPUT_PRESET").unwrap_or(defaults.output_preset),
            restore_on_startup: env_flag("RESTORE_ON_STARTUP", defaults.restore_on_startup),
        }
    }

    /// Encoder settings for rendered artifacts.
    pub fn encoding(&self) -> EncodingConfig {
        EncodingConfig::new()
            .with_crf(self.output_crf)
            .with_preset(self.output_preset.clone())
    }

    pub fn timeouts(&self) -> ToolkitTimeouts {
        ToolkitTimeouts {
            probe_secs: self.probe_timeout_secs,
            frame_secs: self.frame_timeout_secs,
            render_secs: self.transform_timeout_secs,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}
