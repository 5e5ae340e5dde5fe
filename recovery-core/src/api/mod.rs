// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery API Layer
//!
//! High-level facade over the recovery engine.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration types
//! - [`error`] - Error types for the API layer
//! - [`service`] - `RecoveryService` and its builder

pub mod config;
pub mod error;
pub mod service;

pub use config::{
    ConfigError, RecoveryConfig, SyncConfig, DEFAULT_DELAY_PERIOD, DEFAULT_SYNC_FREQUENCY,
};
pub use error::{RecoveryServiceError, RecoveryServiceResult};
pub use service::{RecoveryService, RecoveryServiceBuilder};
