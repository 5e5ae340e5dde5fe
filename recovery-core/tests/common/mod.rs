// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures, fake wiring and proptest strategies.

#![allow(dead_code)]

pub mod fixtures;
pub mod strategies;

/// Installs a tracing subscriber writing through the test harness.
/// Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recovery_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
