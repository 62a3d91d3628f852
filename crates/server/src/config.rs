use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub seed_demo_fleet: bool,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5001".into(),
            seed_demo_fleet: true,
            max_body_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    seed_demo_fleet: Option<bool>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if Path::new(SETTINGS_FILE).exists() {
        let raw = fs::read_to_string(SETTINGS_FILE)
            .with_context(|| format!("failed to read {SETTINGS_FILE}"))?;
        apply_file_overrides(&mut settings, &raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.seed_demo_fleet {
        settings.seed_demo_fleet = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__SEED_DEMO_FLEET") {
        if let Some(parsed) = parse_flag(&v) {
            settings.seed_demo_fleet = parsed;
        }
    }

    if let Some(v) = var("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
