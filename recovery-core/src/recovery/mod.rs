// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delay & Notify Recovery
//!
//! Replaces a lost app key or hardware device after a server-enforced
//! waiting period during which the account owner is notified.
//!
//! ## Flow
//!
//! 1. [`RecoveryInitiator`] stores a pending attempt and asks the server to
//!    start the delay window.
//! 2. [`RecoverySyncer`] polls the server; [`RecoveryStore`] reconciles each
//!    snapshot with local progress and publishes the rendered [`Recovery`].
//! 3. Once the delay has passed, [`RecoveryCompletionPipeline`] walks the
//!    checkpoints until funds are swept to the new keyset.
//! 4. Until keys are activated, [`CancellationService`] can abort.

mod cancel;
mod error;
mod initiate;
mod lifecycle;
mod model;
mod pipeline;
mod reconcile;
mod store;
mod syncer;

pub use cancel::CancellationService;
pub use error::{
    CancelDelayNotifyError, CompletionStep, InitiateRecoveryError, RecoveryStepError,
    StepFailure, StoreError, SyncError,
};
pub use initiate::{create_pending_key_bundles, AppKeyBundle, RecoveryInitiator};
pub use lifecycle::{AppSessionLifecycle, AppSessionState};
pub use model::{
    InitiatedRecovery, KeysetProgress, LocalRecoveryAttemptProgress, PendingRecoveryAttempt,
    Recovery, RecoveryCheckpoint, ServerDependentRecovery, ServerIndependentRecovery,
    ServerRecovery, ServerRecoveryState, StillRecovering,
};
pub use pipeline::{CompletionServices, RecoveryCompletionPipeline};
pub use reconcile::{reconcile, SessionIdentity};
pub use store::{PersistedRecoveryState, RecoveryPersistence, RecoveryStore};
pub use syncer::{RecoverySyncer, SyncHandle};
