use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// What a capture tick submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Skin analysis of the snapshot.
    #[default]
    Analysis,
    /// Server-side makeup transformation of the snapshot.
    Transformation,
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(CaptureMode::Analysis),
            "transformation" | "transform" => Ok(CaptureMode::Transformation),
            other => Err(format!("unknown capture mode: {other}")),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Daemon configuration: defaults, then an optional TOML file, then
/// `FACEPAINT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path or name. Unset picks a front-facing camera.
    pub camera_device: Option<String>,
    /// Overlay tick period.
    pub render_interval_ms: u64,
    /// Capture tick period.
    pub capture_interval_ms: u64,
    /// Whether capture ticks fire on their own while the camera is active.
    pub auto_capture: bool,
    pub capture_mode: CaptureMode,
    /// Skin analysis endpoint.
    pub analysis_url: String,
    /// Makeup transformation endpoint.
    pub transform_url: String,
    /// Bound on one collaborator round trip.
    pub request_timeout_secs: u64,
    /// Trigger a capture when settings change.
    pub auto_apply: bool,
    /// Minimum gap between two auto-applied captures.
    pub auto_apply_throttle_ms: u64,
    /// JPEG quality for submitted snapshots (1–100).
    pub jpeg_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: None,
            render_interval_ms: 33,
            capture_interval_ms: 3000,
            auto_capture: true,
            capture_mode: CaptureMode::Analysis,
            analysis_url: "http://127.0.0.1:3000/api/skin-analysis".to_string(),
            transform_url: "http://127.0.0.1:3000/api/transform-makeup".to_string(),
            request_timeout_secs: 30,
            auto_apply: false,
            auto_apply_throttle_ms: 1000,
            jpeg_quality: 80,
        }
    }
}

impl Config {
    /// Load from `FACEPAINT_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("FACEPAINT_CONFIG").map(PathBuf::from);
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from an optional TOML file and an environment lookup.
    pub fn from_sources(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Config::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(device) = env("FACEPAINT_CAMERA_DEVICE").filter(|v| !v.is_empty()) {
            self.camera_device = Some(device);
        }
        env_parse(&env, "FACEPAINT_RENDER_INTERVAL_MS", &mut self.render_interval_ms);
        env_parse(&env, "FACEPAINT_CAPTURE_INTERVAL_MS", &mut self.capture_interval_ms);
        env_flag(&env, "FACEPAINT_AUTO_CAPTURE", &mut self.auto_capture);
        env_parse(&env, "FACEPAINT_CAPTURE_MODE", &mut self.capture_mode);
        if let Some(url) = env("FACEPAINT_ANALYSIS_URL") {
            self.analysis_url = url;
        }
        if let Some(url) = env("FACEPAINT_TRANSFORM_URL") {
            self.transform_url = url;
        }
        env_parse(&env, "FACEPAINT_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        env_flag(&env, "FACEPAINT_AUTO_APPLY", &mut self.auto_apply);
        env_parse(&env, "FACEPAINT_AUTO_APPLY_THROTTLE_MS", &mut self.auto_apply_throttle_ms);
        let mut quality = u32::from(self.jpeg_quality);
        env_parse(&env, "FACEPAINT_JPEG_QUALITY", &mut quality);
        self.jpeg_quality = quality.clamp(1, 100) as u8;
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn auto_apply_throttle(&self) -> Duration {
        Duration::from_millis(self.auto_apply_throttle_ms)
    }
}

/// Overwrite `slot` when `key` is set and parses; otherwise keep it.
fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = env(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable setting"),
    }
}

/// `0` disables, anything else enables.
fn env_flag(env: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut bool) {
    if let Some(v) = env(key) {
        *slot = v.trim() != "0";
    }
}
