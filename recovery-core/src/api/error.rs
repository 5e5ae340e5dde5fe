// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for the recovery service facade.

use thiserror::Error;

use crate::recovery::{
    CancelDelayNotifyError, InitiateRecoveryError, RecoveryStepError, StoreError, SyncError,
};
use crate::storage::StorageError;

use super::config::ConfigError;

#[derive(Error, Debug)]
pub enum RecoveryServiceError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database could not be opened or migrated.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("recovery store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("initiate recovery error: {0}")]
    Initiate(#[from] InitiateRecoveryError),

    /// A completion step failed; the checkpoint is unchanged.
    #[error("{0}")]
    Step(#[from] RecoveryStepError),

    #[error("cancel recovery error: {0}")]
    Cancel(#[from] CancelDelayNotifyError),

    /// The builder was not given a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Creating the storage directory failed.
    #[error("I/O error: {0}")]
    Io(String),
}

pub type RecoveryServiceResult<T> = Result<T, RecoveryServiceError>;
