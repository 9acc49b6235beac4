//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HEARDLE_BACK_CONFIG_PATH";

const DEFAULT_PUBLIC_WS_BASE_URL: &str = "ws://localhost:8080";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_SESSION_RETENTION_MINUTES: i64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_AUDIO_BASE_URL: &str = "http://localhost:8080/audio";
const DEFAULT_CATALOG_SEED_PATH: &str = "config/catalog.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    public_ws_base_url: String,
    api_prefix: String,
    session_retention: Duration,
    sweep_interval: std::time::Duration,
    audio_base_url: String,
    catalog_seed_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        ws_base = %app_config.public_ws_base_url,
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Prefix under which the REST and WebSocket routes are mounted.
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Public WebSocket URL a client connects to for the given session.
    pub fn ws_url(&self, session_id: Uuid) -> String {
        format!(
            "{}{}/ws/{}",
            self.public_ws_base_url, self.api_prefix, session_id
        )
    }

    /// How long a round stays resolvable for submission after its connection closed.
    pub fn session_retention(&self) -> Duration {
        self.session_retention
    }

    /// Pause between two session sweeps.
    pub fn sweep_interval(&self) -> std::time::Duration {
        self.sweep_interval
    }

    /// Base URL used when audio files are served from a public bucket.
    pub fn audio_base_url(&self) -> &str {
        &self.audio_base_url
    }

    /// JSON catalog loaded by the in-memory backend.
    pub fn catalog_seed_path(&self) -> Option<&PathBuf> {
        self.catalog_seed_path.as_ref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    public_ws_base_url: Option<String>,
    #[serde(default)]
    api_prefix: Option<String>,
    #[serde(default)]
    session_retention_minutes: Option<i64>,
    #[serde(default)]
    sweep_interval_seconds: Option<u64>,
    #[serde(default)]
    audio_base_url: Option<String>,
    #[serde(default)]
    catalog_seed_path: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let public_ws_base_url = value
            .public_ws_base_url
            .unwrap_or_else(|| DEFAULT_PUBLIC_WS_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let api_prefix = normalize_prefix(
            value
                .api_prefix
                .as_deref()
                .unwrap_or(DEFAULT_API_PREFIX),
        );
        let retention_minutes = value
            .session_retention_minutes
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SESSION_RETENTION_MINUTES);
        let sweep_seconds = value
            .sweep_interval_seconds
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS);
        let catalog_seed_path = match value.catalog_seed_path {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_CATALOG_SEED_PATH)),
        };

        Self {
            public_ws_base_url,
            api_prefix,
            session_retention: Duration::minutes(retention_minutes),
            sweep_interval: std::time::Duration::from_secs(sweep_seconds),
            audio_base_url: value
                .audio_base_url
                .unwrap_or_else(|| DEFAULT_AUDIO_BASE_URL.to_owned()),
            catalog_seed_path,
        }
    }
}

/// Ensure a leading slash and no trailing slash; an empty prefix mounts at the root.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
