//! Shared state for command handlers

use anyhow::{Context, Result};
use std::path::Path;

use mfr_sync::api::{Dhis2Client, RegistryClient, ResilienceConfig};
use mfr_sync::config::Config;
use mfr_sync::sync::{FileCursorStore, RunSettings};

pub struct AppContext {
    pub config: Config,
    pub resilience: ResilienceConfig,
    pub cursors: FileCursorStore,
}

impl AppContext {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Config::load(path)?;
        let resilience = config.resilience_config()?;
        let cursors = FileCursorStore::new(config.cursor_dir());
        Ok(Self {
            config,
            resilience,
            cursors,
        })
    }

    pub fn run_settings(&self) -> Result<RunSettings> {
        self.config.run_settings()
    }

    pub fn registry(&self) -> Result<RegistryClient> {
        let registry = &self.config.registry;
        if registry.username.is_empty() || registry.password.is_empty() {
            anyhow::bail!("Registry credentials missing: set MFR_USERNAME and MFR_PASSWORD");
        }
        RegistryClient::new(
            &registry.base_url,
            &registry.username,
            &registry.password,
            self.resilience.clone(),
        )
        .context("Failed to create registry client")
    }

    pub fn destination(&self) -> Result<Dhis2Client> {
        let destination = &self.config.destination;
        if destination.username.is_empty() || destination.password.is_empty() {
            anyhow::bail!("Destination credentials missing: set DHIS2_USERNAME and DHIS2_PASSWORD");
        }
        Dhis2Client::new(
            &destination.base_url,
            &destination.username,
            &destination.password,
            self.resilience.clone(),
        )
        .context("Failed to create destination client")
    }
}
