use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::refresh::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5001";
const SETTINGS_FILE: &str = "dashboard.toml";
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where a backend call originates. The initial snapshot is loaded from the
/// server side and later calls come from the interactive session; the two
/// can reach the backend over different networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    ServerSide,
    Interactive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base: String,
    pub public_api_base: String,
    pub poll_interval: Duration,
}

impl ClientSettings {
    pub fn base_url(&self, origin: CallOrigin) -> &str {
        match origin {
            CallOrigin::ServerSide => &self.api_base,
            CallOrigin::Interactive => &self.public_api_base,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            public_api_base: DEFAULT_API_BASE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{key} is not a valid url ('{value}'): {source}")]
    InvalidUrl {
        key: String,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} must be an http or https url, got '{value}'")]
    UnsupportedScheme { key: String, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base: Option<String>,
    public_api_base: Option<String>,
    poll_interval_secs: Option<u64>,
}

/// Defaults, then `dashboard.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> Result<ClientSettings, ConfigError> {
    let mut settings = ClientSettings::default();

    if Path::new(SETTINGS_FILE).exists() {
        let raw = fs::read_to_string(SETTINGS_FILE).map_err(|source| ConfigError::Read {
            path: SETTINGS_FILE.to_string(),
            source,
        })?;
        apply_file_overrides(&mut settings, &raw)?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub(crate) fn apply_file_overrides(
    settings: &mut ClientSettings,
    raw: &str,
) -> Result<(), ConfigError> {
    let file_cfg: FileSettings = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: SETTINGS_FILE.to_string(),
        source,
    })?;

    if let Some(v) = file_cfg.api_base {
        settings.api_base = parse_base_url("api_base", &v)?;
    }
    if let Some(v) = file_cfg.public_api_base {
        settings.public_api_base = parse_base_url("public_api_base", &v)?;
    }
    if let Some(v) = file_cfg.poll_interval_secs {
        settings.poll_interval = Duration::from_secs(v).max(MIN_POLL_INTERVAL);
    }
    Ok(())
}

pub(crate) fn apply_env_overrides(
    settings: &mut ClientSettings,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    // Blank values count as unset and keep the current base.
    let non_blank = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    for key in ["API_BASE", "APP__API_BASE"] {
        if let Some(v) = non_blank(key) {
            settings.api_base = parse_base_url(key, &v)?;
        }
    }
    for key in ["PUBLIC_API_BASE", "APP__PUBLIC_API_BASE"] {
        if let Some(v) = non_blank(key) {
            settings.public_api_base = parse_base_url(key, &v)?;
        }
    }
    if let Some(v) = non_blank("APP__POLL_INTERVAL_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.poll_interval = Duration::from_secs(parsed).max(MIN_POLL_INTERVAL);
        }
    }
    Ok(())
}

/// Validates a base url and returns it without a trailing slash.
fn parse_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let value = raw.trim();
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
