// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery Configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::keys::BitcoinNetwork;

/// Default interval between recovery status polls.
pub const DEFAULT_SYNC_FREQUENCY: Duration = Duration::from_secs(3);

/// Default delay window for a new recovery (7 days).
pub const DEFAULT_DELAY_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("sync frequency must be greater than zero")]
    ZeroSyncFrequency,
}

/// Recovery status polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub sync_frequency: Duration,
    /// Start polling as soon as the service is built inside a tokio runtime.
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            sync_frequency: DEFAULT_SYNC_FREQUENCY,
            auto_sync: true,
        }
    }
}

/// Configuration for a [`RecoveryService`](super::RecoveryService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// SQLite database path. `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,
    pub sync: SyncConfig,
    /// Delay window requested when initiating a recovery.
    pub delay_period: Duration,
    /// Network of the spending keysets created during completion.
    pub network: BitcoinNetwork,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            storage_path: None,
            sync: SyncConfig::default(),
            delay_period: DEFAULT_DELAY_PERIOD,
            network: BitcoinNetwork::Bitcoin,
        }
    }
}

impl RecoveryConfig {
    /// Creates a config with the given storage path.
    pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
        RecoveryConfig {
            storage_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_sync_frequency(mut self, frequency: Duration) -> Self {
        self.sync.sync_frequency = frequency;
        self
    }

    pub fn with_delay_period(mut self, delay_period: Duration) -> Self {
        self.delay_period = delay_period;
        self
    }

    pub fn with_network(mut self, network: BitcoinNetwork) -> Self {
        self.network = network;
        self
    }

    pub fn without_auto_sync(mut self) -> Self {
        self.sync.auto_sync = false;
        self
    }

    /// Defaults overridden by `RECOVERY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RecoveryConfig::default();

        if let Some(path) = lookup("RECOVERY_STORAGE_PATH") {
            config.storage_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RECOVERY_SYNC_FREQUENCY_SECS")? {
            config.sync.sync_frequency = Duration::from_secs(secs);
        }
        if let Some(auto_sync) = parse_var::<bool, _>(&lookup, "RECOVERY_AUTO_SYNC")? {
            config.sync.auto_sync = auto_sync;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RECOVERY_DELAY_PERIOD_SECS")? {
            config.delay_period = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.sync_frequency.is_zero() {
            return Err(ConfigError::ZeroSyncFrequency);
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}
