//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the
//! backend base URL, request timeout, cache retention and the last email used
//! to log in. Environment variables override the file.
//!
//! Configuration is stored at `~/.config/vitalsdesk/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::config::DEFAULT_KEEP_UNUSED_DATA_FOR;
use crate::cache::StoreConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "vitalsdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL used when neither the file nor the environment sets one.
pub const DEFAULT_API_BASE: &str = "/api";

pub const ENV_API_BASE: &str = "VITALSDESK_API_BASE";
pub const ENV_TOKEN: &str = "VITALSDESK_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub keep_unused_data_for_secs: Option<u64>,
    pub last_email: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// Token from the environment. Never written to disk.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Environment values win over the file. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(base) = non_empty(ENV_API_BASE) {
            self.api_base_url = Some(base);
        }
        if let Some(token) = non_empty(ENV_TOKEN) {
            self.token = Some(token);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(
            self.keep_unused_data_for_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_KEEP_UNUSED_DATA_FOR),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.store_config().keep_unused_data_for, Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config {
            api_base_url: Some("https://file.example.com/api".into()),
            ..Config::default()
        };
        config.apply_overrides(env(&[
            (ENV_API_BASE, "https://env.example.com/api"),
            (ENV_TOKEN, "env-token"),
        ]));
        assert_eq!(config.api_base_url(), "https://env.example.com/api");
        assert_eq!(config.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = Config {
            api_base_url: Some("https://file.example.com/api".into()),
            ..Config::default()
        };
        config.apply_overrides(env(&[(ENV_API_BASE, "  "), (ENV_TOKEN, "")]));
        assert_eq!(config.api_base_url(), "https://file.example.com/api");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_save_and_load_skip_token() {
        let path = std::env::temp_dir()
            .join(format!("vitalsdesk-config-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("http://localhost:3000".into()),
            keep_unused_data_for_secs: Some(5),
            last_email: Some("doc@example.com".into()),
            token: Some("secret".into()),
            ..Config::default()
        };
        config.save_to(&path).expect("save should succeed");

        let loaded = Config::load_from(&path).expect("load should succeed");
        assert_eq!(loaded.api_base_url(), "http://localhost:3000");
        assert_eq!(loaded.store_config().keep_unused_data_for, Duration::from_secs(5));
        assert_eq!(loaded.last_email.as_deref(), Some("doc@example.com"));
        assert!(loaded.token.is_none());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("vitalsdesk-no-such-dir").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).expect("load"), Config::default());
    }
}
