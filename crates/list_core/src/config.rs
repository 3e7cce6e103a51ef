use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::gateway::base_url;

pub const DEFAULT_SETTINGS_FILE: &str = "list.toml";

/// Tunables of the reconciliation controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub page_size: u32,
    pub request_timeout_ms: u64,
    /// Distance in pixels from the bottom that counts as "near bottom".
    pub scroll_threshold: f64,
    /// Restore the previous local state when an optimistic save fails.
    pub rollback_on_failure: bool,
    /// Refresh order and selection from the service on every search reload.
    pub resync_state_on_search: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            request_timeout_ms: 10_000,
            scroll_threshold: 100.0,
            rollback_on_failure: false,
            resync_state_on_search: false,
        }
    }
}

impl ControllerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub controller: ControllerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            controller: ControllerConfig::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.controller.page_size == 0 {
            bail!("page_size must be greater than zero");
        }
        if self.controller.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than zero");
        }
        base_url(&self.server_url)?;
        Ok(())
    }
}

/// Defaults, then the TOML file (`list.toml` unless `path` is given), then
/// `APP__*` environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path: PathBuf = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));

    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__PAGE_SIZE") {
        settings.controller.page_size = v
            .parse()
            .with_context(|| format!("APP__PAGE_SIZE is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_MS") {
        settings.controller.request_timeout_ms = v
            .parse()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_MS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("APP__ROLLBACK_ON_FAILURE") {
        settings.controller.rollback_on_failure = parse_flag("APP__ROLLBACK_ON_FAILURE", &v)?;
    }
    if let Some(v) = lookup("APP__RESYNC_STATE_ON_SEARCH") {
        settings.controller.resync_state_on_search =
            parse_flag("APP__RESYNC_STATE_ON_SEARCH", &v)?;
    }
    Ok(())
}

fn parse_flag(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got '{raw}'"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
