// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for api::config

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use recovery_core::api::{DEFAULT_DELAY_PERIOD, DEFAULT_SYNC_FREQUENCY};
use recovery_core::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |var| vars.get(var).cloned()
}

#[test]
fn test_config_defaults() {
    let config = RecoveryConfig::default();

    assert!(config.storage_path.is_none());
    assert_eq!(config.sync.sync_frequency, Duration::from_secs(3));
    assert_eq!(config.sync.sync_frequency, DEFAULT_SYNC_FREQUENCY);
    assert!(config.sync.auto_sync);
    assert_eq!(config.delay_period, Duration::from_secs(7 * 24 * 60 * 60));
    assert_eq!(config.delay_period, DEFAULT_DELAY_PERIOD);
    assert_eq!(config.network, BitcoinNetwork::Bitcoin);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_builder_methods() {
    let config = RecoveryConfig::with_storage_path("/tmp/recovery.db")
        .with_sync_frequency(Duration::from_secs(10))
        .with_delay_period(Duration::from_secs(60))
        .with_network(BitcoinNetwork::Signet)
        .without_auto_sync();

    assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/recovery.db")));
    assert_eq!(config.sync.sync_frequency, Duration::from_secs(10));
    assert_eq!(config.delay_period, Duration::from_secs(60));
    assert_eq!(config.network, BitcoinNetwork::Signet);
    assert!(!config.sync.auto_sync);
}

#[test]
fn test_config_from_lookup_without_vars_is_default() {
    let config = RecoveryConfig::from_lookup(lookup(&[])).unwrap();

    assert_eq!(config, RecoveryConfig::default());
}

#[test]
fn test_config_from_lookup_reads_all_vars() {
    let config = RecoveryConfig::from_lookup(lookup(&[
        ("RECOVERY_STORAGE_PATH", "/var/lib/wallet/recovery.db"),
        ("RECOVERY_SYNC_FREQUENCY_SECS", " 15 "),
        ("RECOVERY_AUTO_SYNC", "false"),
        ("RECOVERY_DELAY_PERIOD_SECS", "300"),
    ]))
    .unwrap();

    assert_eq!(
        config.storage_path,
        Some(PathBuf::from("/var/lib/wallet/recovery.db"))
    );
    assert_eq!(config.sync.sync_frequency, Duration::from_secs(15));
    assert!(!config.sync.auto_sync);
    assert_eq!(config.delay_period, Duration::from_secs(300));
}

#[test]
fn test_config_from_lookup_rejects_malformed_values() {
    let err = RecoveryConfig::from_lookup(lookup(&[("RECOVERY_SYNC_FREQUENCY_SECS", "soon")]))
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue {
            var: "RECOVERY_SYNC_FREQUENCY_SECS",
            value: "soon".into()
        }
    );

    let err = RecoveryConfig::from_lookup(lookup(&[("RECOVERY_AUTO_SYNC", "yes")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            var: "RECOVERY_AUTO_SYNC",
            ..
        }
    ));
}

#[test]
fn test_config_rejects_zero_sync_frequency() {
    let config = RecoveryConfig::default().with_sync_frequency(Duration::ZERO);
    assert_eq!(config.validate(), Err(ConfigError::ZeroSyncFrequency));

    let err = RecoveryConfig::from_lookup(lookup(&[("RECOVERY_SYNC_FREQUENCY_SECS", "0")]))
        .unwrap_err();
    assert_eq!(err, ConfigError::ZeroSyncFrequency);
}
