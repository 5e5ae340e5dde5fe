// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery error types.
//!
//! Expected failures are always returned as typed values. Collaborator
//! panics inside pipeline steps surface as [`StepFailure::Unhandled`].

use std::fmt;

use thiserror::Error;

use crate::backup::BackupError;
use crate::crypto::{EncryptionError, SignatureError};
use crate::f8e::F8eError;
use crate::hardware::HardwareError;
use crate::storage::StorageError;
use crate::sweep::SweepError;

/// Errors from the recovery store.
///
/// A failed write never changes what the store reports.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid checkpoint transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("progress belongs to a different recovery attempt")]
    AttemptMismatch,

    #[error("hardware signature over app auth key is invalid: {0}")]
    InvalidHardwareSignature(#[from] SignatureError),
}

/// Errors from polling the recovery status.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to fetch recovery status: {0}")]
    F8e(#[from] F8eError),

    #[error("failed to store recovery status: {0}")]
    Local(#[from] StoreError),
}

/// Errors from cancelling a delay-and-notify recovery.
#[derive(Error, Debug)]
pub enum CancelDelayNotifyError {
    #[error("recovery can no longer be cancelled after {checkpoint}")]
    CancellationNotAllowed { checkpoint: &'static str },

    #[error("cannot cancel recovery for {requested} while signed in as {session}")]
    AccountMismatch { requested: String, session: String },

    /// The server rejected the cancellation (anything but "no recovery exists").
    #[error("failed to cancel recovery on server: {0}")]
    F8e(F8eError),

    /// Local progress could not be cleared.
    #[error("failed to clear local recovery: {0}")]
    Local(StoreError),
}

/// Errors from initiating a recovery.
#[derive(Error, Debug)]
pub enum InitiateRecoveryError {
    #[error("hardware signature over app auth key is invalid: {0}")]
    InvalidHardwareSignature(#[from] SignatureError),

    #[error("a recovery is already in progress on this device")]
    AlreadyRecovering,

    #[error("recovery is for account {requested}, session is {session}")]
    AccountMismatch { requested: String, session: String },

    #[error("another recovery is already pending for this account")]
    RecoveryConflict,

    #[error("failed to initiate recovery on server: {0}")]
    F8e(F8eError),

    #[error("failed to store recovery progress: {0}")]
    Local(#[from] StoreError),
}

/// One step of the completion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStep {
    BeginCompletion,
    RotateAuthKeys,
    CreateSpendingKeys,
    UploadDescriptorBackups,
    ActivateSpendingKeys,
    BackUpDdk,
    BackUpToCloud,
    SweepFunds,
}

impl CompletionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStep::BeginCompletion => "begin completion",
            CompletionStep::RotateAuthKeys => "rotate auth keys",
            CompletionStep::CreateSpendingKeys => "create spending keys",
            CompletionStep::UploadDescriptorBackups => "upload descriptor backups",
            CompletionStep::ActivateSpendingKeys => "activate spending keys",
            CompletionStep::BackUpDdk => "back up delegated decryption key",
            CompletionStep::BackUpToCloud => "back up to cloud",
            CompletionStep::SweepFunds => "sweep funds",
        }
    }

    /// Name of the checkpoint this step commits on success.
    pub fn checkpoint_name(&self) -> &'static str {
        match self {
            CompletionStep::BeginCompletion => "AttemptingCompletion",
            CompletionStep::RotateAuthKeys => "RotatedAuthKeys",
            CompletionStep::CreateSpendingKeys => "CreatedSpendingKeys",
            CompletionStep::UploadDescriptorBackups => "UploadedDescriptorBackups",
            CompletionStep::ActivateSpendingKeys => "ActivatedSpendingKeys",
            CompletionStep::BackUpDdk => "DdkBackedUp",
            CompletionStep::BackUpToCloud => "BackedUpToCloud",
            CompletionStep::SweepFunds => "SweptFunds",
        }
    }

    /// Steps that need a live NFC session with the hardware device.
    pub fn requires_hardware(&self) -> bool {
        matches!(
            self,
            CompletionStep::BeginCompletion | CompletionStep::ActivateSpendingKeys
        )
    }
}

impl fmt::Display for CompletionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pipeline step failed.
#[derive(Error, Debug)]
pub enum StepFailure {
    #[error("delay period has not ended ({remaining_secs}s remaining)")]
    DelayNotElapsed { remaining_secs: u64 },

    #[error("no recovery in progress")]
    NoRecoveryInProgress,

    #[error("recovery is no longer active on the server")]
    NoLongerRecovering,

    #[error("server recovery status is unknown, re-check required")]
    RecheckRequired,

    #[error("another recovery is pending for this account")]
    ConflictingRecovery,

    #[error("hardware session required")]
    HardwareSessionRequired,

    #[error("session key for this attempt is unavailable")]
    MissingSessionKey,

    #[error("new keyset missing from recovery progress")]
    MissingKeyset,

    #[error("server error: {0}")]
    F8e(#[from] F8eError),

    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("local storage error: {0}")]
    Local(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

/// A failed pipeline step. The checkpoint is left untouched, so the same
/// step can be retried.
#[derive(Error, Debug)]
#[error("failed to {step}: {failure}")]
pub struct RecoveryStepError {
    pub step: CompletionStep,
    #[source]
    pub failure: StepFailure,
}

impl RecoveryStepError {
    pub fn new(step: CompletionStep, failure: impl Into<StepFailure>) -> Self {
        RecoveryStepError {
            step,
            failure: failure.into(),
        }
    }

    /// True when the failure came from local persistence.
    pub fn is_local(&self) -> bool {
        matches!(self.failure, StepFailure::Local(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_names_step_and_cause() {
        let err = RecoveryStepError::new(
            CompletionStep::CreateSpendingKeys,
            F8eError::Connectivity("timeout".into()),
        );
        assert_eq!(
            err.to_string(),
            "failed to create spending keys: server error: network error: timeout"
        );
        assert_eq!(err.step.checkpoint_name(), "CreatedSpendingKeys");
    }

    #[test]
    fn test_hardware_steps() {
        assert!(CompletionStep::BeginCompletion.requires_hardware());
        assert!(CompletionStep::ActivateSpendingKeys.requires_hardware());
        assert!(!CompletionStep::RotateAuthKeys.requires_hardware());
        assert!(!CompletionStep::SweepFunds.requires_hardware());
    }
}
