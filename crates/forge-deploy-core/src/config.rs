//! Per-user settings for the deploy CLI
//!
//! Loaded from `~/.config/forge-deploy/config.json` (or the path in
//! `FORGE_DEPLOY_CONFIG`), then overridden by:
//! - `FORGE_API_TOKEN`: API token
//! - `FORGE_API_URL`: API base URL
//!
//! This is separate from the project-local `.forge` file, which only
//! describes deployment targets.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ForgeError, Result};
use crate::forge::DEFAULT_API_URL;
use crate::utils::expand_tilde;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Settings file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Give up waiting on a deployment after this long; unset waits forever
    #[serde(default)]
    pub deploy_timeout_secs: Option<u64>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    settings: SettingsFile,
    api_url: String,
}

impl AppConfig {
    /// Load configuration from the settings file and environment
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        let settings: SettingsFile = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?
        } else {
            SettingsFile::default()
        };

        Ok(Self::from_settings(
            settings,
            std::env::var("FORGE_API_TOKEN").ok(),
            std::env::var("FORGE_API_URL").ok(),
        ))
    }

    /// Combine file settings with overrides; non-empty overrides win
    pub fn from_settings(
        mut settings: SettingsFile,
        token_override: Option<String>,
        url_override: Option<String>,
    ) -> Self {
        if let Some(token) = token_override.filter(|t| !t.trim().is_empty()) {
            settings.token = Some(token);
        }

        let api_url = url_override
            .filter(|u| !u.trim().is_empty())
            .or_else(|| settings.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self { settings, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_token(&self) -> Result<&str> {
        self.settings
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ForgeError::Configuration("No Forge API token configured".to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.settings
                .poll_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    pub fn deploy_timeout(&self) -> Option<Duration> {
        self.settings.deploy_timeout_secs.map(Duration::from_secs)
    }

    fn get_config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("FORGE_DEPLOY_CONFIG") {
            return Ok(expand_tilde(&path));
        }

        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".config/forge-deploy/config.json"))
    }
}
