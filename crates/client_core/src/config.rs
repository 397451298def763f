use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::error::SettingsError;

pub const REFRESH_LIST_INTERVAL: Duration = Duration::from_millis(2500);
/// Every Nth background refresh also pulls per-server statistics.
pub const STAT_REQUEST_PERIOD: u64 = 10;
pub const SELF_UPDATE_RETRY_DELAY: Duration = Duration::from_millis(2000);

pub const SETTINGS_FILE: &str = "cluster-admin.toml";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8081";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timing of the coordinator's background work. Production code uses the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub refresh_interval: Duration,
    pub stat_request_period: u64,
    pub self_update_retry_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            refresh_interval: REFRESH_LIST_INTERVAL,
            stat_request_period: STAT_REQUEST_PERIOD,
            self_update_retry_delay: SELF_UPDATE_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `cluster-admin.toml` in the working directory, then environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_cfg: FileSettings =
            toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if let Some(v) = file_cfg.server_url {
            settings.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout = Duration::from_secs(v);
        }
    }

    if let Some(v) = env("CLUSTER_ADMIN_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout = Duration::from_secs(parsed);
        }
    }

    settings.server_url = normalize_server_url(&settings.server_url)?;
    Ok(settings)
}

pub fn normalize_server_url(raw: &str) -> Result<String, SettingsError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|source| SettingsError::InvalidServerUrl {
        value: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(SettingsError::UnsupportedScheme(other.to_string())),
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
