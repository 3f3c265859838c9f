use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::provider::ProviderId;

pub const DEFAULT_HORIZON_DAYS: u32 = 5;
/// Longest forecast any supported provider serves (WeatherAPI.com).
pub const MAX_HORIZON_DAYS: u32 = 14;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_SUMMARY_MODEL: &str = "claude-3-5-haiku-20241022";

/// Configuration for a single forecast provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Override for the provider endpoint root (tests, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Language model settings for the summary generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub api_key: String,

    #[serde(default = "default_summary_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_summary_model() -> String {
    DEFAULT_SUMMARY_MODEL.to_string()
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "weatherapi" or "openweather".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// SQLite file; defaults to `weather.db` in the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Days ahead of today that a resolution may reach.
    pub forecast_horizon_days: Option<u32>,

    /// Address the HTTP server listens on.
    pub bind_addr: Option<String>,

    /// [summary]
    /// api_key = "..."
    /// model = "..."
    pub summary: Option<SummaryConfig>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weathercache configure <provider>` (e.g. `weathercache configure weatherapi`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Configured horizon, capped at [`MAX_HORIZON_DAYS`].
    pub fn horizon_days(&self) -> u32 {
        self.forecast_horizon_days
            .unwrap_or(DEFAULT_HORIZON_DAYS)
            .min(MAX_HORIZON_DAYS)
    }

    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Load from disk, then layer environment variables on top.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weathercache", "weathercache")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Configured database path, or the platform default.
    pub fn database_file_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("weather.db")),
        }
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        let base_url = self.provider_config(provider_id).and_then(|c| c.base_url.clone());
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key, base_url });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// Overlay values from `lookup` (normally the process environment).
    ///
    /// Recognised keys: `WEATHERAPI_KEY`, `OPENWEATHER_API_KEY`,
    /// `WEATHERCACHE_PROVIDER`, `ANTHROPIC_API_KEY`, `WEATHERCACHE_DB`,
    /// `WEATHERCACHE_BIND`, `WEATHERCACHE_HORIZON_DAYS`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEATHERAPI_KEY") {
            self.upsert_provider_api_key(ProviderId::WeatherApi, key);
        }
        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.upsert_provider_api_key(ProviderId::OpenWeather, key);
        }
        if let Some(id) = lookup("WEATHERCACHE_PROVIDER") {
            self.default_provider = Some(id);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            match self.summary.as_mut() {
                Some(summary) => summary.api_key = key,
                None => {
                    self.summary = Some(SummaryConfig {
                        api_key: key,
                        model: default_summary_model(),
                        base_url: None,
                    })
                }
            }
        }
        if let Some(path) = lookup("WEATHERCACHE_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(addr) = lookup("WEATHERCACHE_BIND") {
            self.bind_addr = Some(addr);
        }
        if let Some(days) = lookup("WEATHERCACHE_HORIZON_DAYS").and_then(|d| d.parse().ok()) {
            self.forecast_horizon_days = Some(days);
        }
    }
}
