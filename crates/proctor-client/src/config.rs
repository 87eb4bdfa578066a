//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use proctor_core::controller::ControllerOptions;

use crate::http::{HttpApi, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Top-level proctor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Base URL of the assessment server.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Countdown refresh period in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Feedback window after a choice, in milliseconds. 0 disables it.
    #[serde(default = "default_advance_delay")]
    pub advance_delay_ms: u64,
    /// Allow returning to earlier questions.
    #[serde(default)]
    pub allow_back_navigation: bool,
    /// Post a scored record to `/api/submit_result` after submitting.
    #[serde(default)]
    pub record_results: bool,
    /// Write the results JSON file after a successful submission.
    #[serde(default = "default_true")]
    pub export_results: bool,
    /// Directory for exported results.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_api_base() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_tick_interval() -> u64 {
    250
}
fn default_advance_delay() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_timeout(),
            tick_interval_ms: default_tick_interval(),
            advance_delay_ms: default_advance_delay(),
            allow_back_navigation: false,
            record_results: false,
            export_results: true,
            export_dir: default_export_dir(),
        }
    }
}

impl ProctorConfig {
    /// Controller switches derived from this config.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            advance_delay: Duration::from_millis(self.advance_delay_ms),
            allow_back_navigation: self.allow_back_navigation,
            record_results: self.record_results,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        // A zero period would spin the event loop.
        Duration::from_millis(self.tick_interval_ms.max(10))
    }

    /// Build the HTTP client for the configured server.
    pub fn create_api(&self) -> Result<HttpApi> {
        HttpApi::new(
            &self.api_base,
            Duration::from_secs(self.request_timeout_secs),
        )
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `proctor.toml` in the current directory
/// 2. `~/.config/proctor/config.toml`
///
/// Environment variable override: `PROCTOR_API_BASE`.
pub fn load_config() -> Result<ProctorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ProctorConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("proctor.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ProctorConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ProctorConfig::default(),
    };

    if let Ok(base) = std::env::var("PROCTOR_API_BASE") {
        config.api_base = base;
    }
    config.api_base = resolve_env_vars(&config.api_base);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("proctor"))
}
