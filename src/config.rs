use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

use crate::controller::SubmitMode;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CHAT_PATH: &str = "/chat";

/// Overrides `server_url` from the config file.
pub const URL_ENV_VAR: &str = "VIBE_ASSIST_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server_url: Option<String>,
    pub chat_path: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub serialize_submissions: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user's config directory. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    /// Write to `config_path` unless a file is already there. Returns
    /// false when an existing file was left alone.
    pub fn save_new(&self, config_path: &Path, overwrite: bool) -> Result<bool> {
        if config_path.exists() && !overwrite {
            return Ok(false);
        }
        self.save_to(config_path)?;
        Ok(true)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("vibe-assist").join("config.json"))
    }

    /// Apply `VIBE_ASSIST_URL` if it is set.
    pub fn with_env_overrides(self) -> Self {
        self.with_url_override(std::env::var(URL_ENV_VAR).ok())
    }

    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.server_url = Some(url);
        }
        self
    }

    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn chat_path(&self) -> String {
        self.chat_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn submit_mode(&self) -> SubmitMode {
        if self.serialize_submissions.unwrap_or(false) {
            SubmitMode::Serialized
        } else {
            SubmitMode::Concurrent
        }
    }

    /// Copy with every connection setting spelled out, as written by
    /// `vibe-assist init`.
    pub fn resolved(&self) -> Self {
        Self {
            server_url: Some(self.server_url()),
            chat_path: Some(self.chat_path()),
            serialize_submissions: Some(self.submit_mode() == SubmitMode::Serialized),
            ..self.clone()
        }
    }

    /// Where diagnostics are written. `None` only when neither a path is
    /// configured nor a cache directory can be found.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(|| {
            dirs::cache_dir().map(|dir| dir.join("vibe-assist").join("vibe-assist.log"))
        })
    }
}
