//! Configuration management for mfr-sync
//!
//! Settings come from a TOML file (by default `<config dir>/mfr-sync/config.toml`)
//! and are overridden by environment variables. Credentials are expected in
//! the environment or a `.env` file rather than in the TOML file.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::registry::PropertyKeys;
use crate::api::resilience::{LogLevel, ResilienceConfig};
use crate::sync::UnitDefaults;
use crate::sync::runner::RunSettings;

const APP_DIR: &str = "mfr-sync";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub destination: DestinationConfig,
    pub cursor: CursorConfig,
    pub resilience: ResilienceSettings,
}

/// Resource Map (MFR) connection and collection layout
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub collection: String,
    pub hierarchy_field: String,
    /// Keys under which hierarchy nodes list their sub-nodes
    pub hierarchy_child_keys: Vec<String>,
    pub properties: PropertyKeys,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let run = RunSettings::default();
        Self {
            base_url: "https://resourcemap.instedd.org/api".into(),
            username: String::new(),
            password: String::new(),
            collection: run.collection_name,
            hierarchy_field: run.hierarchy_field,
            hierarchy_child_keys: run.hierarchy_child_keys,
            properties: run.property_keys,
        }
    }
}

/// DHIS2 connection and org unit defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub root_name: String,
    /// `YYYY-MM-DD`
    pub opening_date: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        let defaults = UnitDefaults::default();
        Self {
            base_url: "http://localhost:8080/api".into(),
            username: String::new(),
            password: String::new(),
            root_name: defaults.root_name,
            opening_date: defaults.opening_date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Directory holding `last_added` and `last_updated`
    pub dir: Option<PathBuf>,
    /// Value used by a stream that never completed
    pub initial: String,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            dir: None,
            initial: RunSettings::default().initial_cursor,
        }
    }
}

/// `[resilience]` table; unset fields keep the preset's values
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// `default`, `conservative`, `development` or `disabled`
    pub preset: Option<String>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub request_logging: Option<bool>,
    pub log_level: Option<String>,
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load the config file and apply environment overrides.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Override values from the environment, looked up through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 6] = [
            ("MFR_BASE_URL", &mut self.registry.base_url),
            ("MFR_USERNAME", &mut self.registry.username),
            ("MFR_PASSWORD", &mut self.registry.password),
            ("DHIS2_BASE_URL", &mut self.destination.base_url),
            ("DHIS2_USERNAME", &mut self.destination.username),
            ("DHIS2_PASSWORD", &mut self.destination.password),
        ];
        for (key, target) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        }
    }

    /// Check that everything a run needs is present
    pub fn validate(&self) -> Result<()> {
        if self.registry.base_url.trim().is_empty() {
            anyhow::bail!("registry.base_url is not set (or MFR_BASE_URL)");
        }
        if self.destination.base_url.trim().is_empty() {
            anyhow::bail!("destination.base_url is not set (or DHIS2_BASE_URL)");
        }
        if self.registry.username.is_empty() || self.registry.password.is_empty() {
            anyhow::bail!("Registry credentials missing: set MFR_USERNAME and MFR_PASSWORD");
        }
        if self.destination.username.is_empty() || self.destination.password.is_empty() {
            anyhow::bail!("Destination credentials missing: set DHIS2_USERNAME and DHIS2_PASSWORD");
        }
        self.run_settings()?;
        self.resilience_config()?;
        Ok(())
    }

    pub fn run_settings(&self) -> Result<RunSettings> {
        let opening_date = NaiveDate::parse_from_str(&self.destination.opening_date, "%Y-%m-%d")
            .with_context(|| {
                format!(
                    "destination.opening_date must be YYYY-MM-DD, got '{}'",
                    self.destination.opening_date
                )
            })?;
        if crate::sync::parse_timestamp(&self.cursor.initial).is_none() {
            anyhow::bail!(
                "cursor.initial must look like 2019-01-01T00:00:00Z, got '{}'",
                self.cursor.initial
            );
        }
        if self.registry.hierarchy_child_keys.is_empty() {
            anyhow::bail!("registry.hierarchy_child_keys must name at least one key");
        }
        Ok(RunSettings {
            collection_name: self.registry.collection.clone(),
            hierarchy_field: self.registry.hierarchy_field.clone(),
            hierarchy_child_keys: self.registry.hierarchy_child_keys.clone(),
            property_keys: self.registry.properties.clone(),
            defaults: UnitDefaults {
                root_name: self.destination.root_name.clone(),
                opening_date,
            },
            initial_cursor: self.cursor.initial.clone(),
        })
    }

    /// Preset named in `[resilience]` with the explicit fields applied on top
    pub fn resilience_config(&self) -> Result<ResilienceConfig> {
        let settings = &self.resilience;
        let preset = match settings.preset.as_deref().unwrap_or("default") {
            "default" => ResilienceConfig::default(),
            "conservative" => ResilienceConfig::conservative(),
            "development" => ResilienceConfig::development(),
            "disabled" => ResilienceConfig::disabled(),
            other => anyhow::bail!("Unknown resilience preset '{}'", other),
        };

        let mut builder = ResilienceConfig::builder()
            .retry_config(preset.retry.clone())
            .request_timeout(preset.request_timeout)
            .request_logging(preset.monitoring.request_logging)
            .performance_metrics(preset.monitoring.performance_metrics)
            .log_level(preset.monitoring.log_level);

        if let Some(attempts) = settings.max_attempts {
            if attempts == 0 {
                anyhow::bail!("resilience.max_attempts must be at least 1");
            }
            builder = builder.max_attempts(attempts);
        }
        if let Some(ms) = settings.base_delay_ms {
            builder = builder.base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = settings.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(ms));
        }
        if let Some(multiplier) = settings.backoff_multiplier {
            builder = builder.backoff_multiplier(multiplier);
        }
        if let Some(jitter) = settings.jitter {
            builder = builder.jitter(jitter);
        }
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.request_timeout(Some(Duration::from_secs(secs)));
        }
        if let Some(enabled) = settings.request_logging {
            builder = builder.request_logging(enabled);
        }
        if let Some(level) = &settings.log_level {
            builder = builder.log_level(LogLevel::parse(level));
        }
        Ok(builder.build())
    }

    /// Configured cursor directory, else `<data dir>/mfr-sync/cursors`
    pub fn cursor_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cursor.dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("cursors"))
            .unwrap_or_else(|| PathBuf::from(".mfr-sync").join("cursors"))
    }
}
