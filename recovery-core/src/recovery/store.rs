// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery Store
//!
//! Single writer for local recovery progress and the cached server
//! snapshot. Keeps an in-memory copy of what was last committed and
//! publishes the reconciled [`Recovery`] to subscribers after every
//! successful write. A failed write leaves both the cache and the
//! published value untouched.

use parking_lot::Mutex;
use tokio::sync::{watch, MutexGuard};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::crypto::SymmetricKey;
use crate::keys::SealedSessionKeys;
use crate::storage::StorageError;

use super::error::StoreError;
use super::model::{LocalRecoveryAttemptProgress, Recovery, ServerRecovery, ServerRecoveryState};
use super::reconcile::{reconcile, SessionIdentity};

/// Durable backing for the recovery store.
///
/// Each method is one atomic write or read.
pub trait RecoveryPersistence: Send {
    fn load(&self) -> Result<PersistedRecoveryState, StorageError>;

    fn save_local_progress(&self, progress: &LocalRecoveryAttemptProgress)
        -> Result<(), StorageError>;

    fn save_server_recovery(&self, state: &ServerRecoveryState) -> Result<(), StorageError>;

    /// Removes local progress, the cached snapshot and all session keys.
    fn clear(&self) -> Result<(), StorageError>;

    fn save_session_keys(
        &self,
        sealed: &SealedSessionKeys,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<(), StorageError>;

    fn load_session_key(&self, sealed: &[u8]) -> Result<Option<SymmetricKey>, StorageError>;
}

/// Both reconciler inputs as last committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedRecoveryState {
    pub local: Option<LocalRecoveryAttemptProgress>,
    pub server: ServerRecoveryState,
}

struct Inner {
    persistence: Box<dyn RecoveryPersistence>,
    state: PersistedRecoveryState,
}

/// Reactive recovery store.
pub struct RecoveryStore {
    inner: Mutex<Inner>,
    identity: SessionIdentity,
    recovery_tx: watch::Sender<Recovery>,
    transition_lock: tokio::sync::Mutex<()>,
}

impl RecoveryStore {
    /// Loads persisted state and renders the initial [`Recovery`].
    pub fn new(
        persistence: Box<dyn RecoveryPersistence>,
        identity: SessionIdentity,
    ) -> Result<Self, StoreError> {
        let state = persistence.load()?;
        let recovery = reconcile(state.local.as_ref(), &state.server, &identity);
        debug!(
            account = %identity.full_account_id,
            checkpoint = state.local.as_ref().map(|l| l.checkpoint.name()),
            server = state.server.as_str(),
            "Recovery store loaded"
        );
        let (recovery_tx, _) = watch::channel(recovery);

        Ok(RecoveryStore {
            inner: Mutex::new(Inner { persistence, state }),
            identity,
            recovery_tx,
            transition_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Stream of rendered states. Yields the current value first, then one
    /// item per change; identical consecutive values are not repeated.
    pub fn active_recovery(&self) -> WatchStream<Recovery> {
        WatchStream::new(self.recovery_tx.subscribe())
    }

    pub fn subscribe(&self) -> watch::Receiver<Recovery> {
        self.recovery_tx.subscribe()
    }

    /// Currently rendered state.
    pub fn current(&self) -> Recovery {
        self.recovery_tx.borrow().clone()
    }

    /// Last committed reconciler inputs.
    pub fn state(&self) -> PersistedRecoveryState {
        self.inner.lock().state.clone()
    }

    pub fn local_progress(&self) -> Option<LocalRecoveryAttemptProgress> {
        self.inner.lock().state.local.clone()
    }

    /// Commits a new checkpoint.
    ///
    /// The first write must be `CreatedPendingKeyBundles`; after that a write
    /// may repeat the current stage or move to the next one, for the same
    /// attempt. Every checkpoint past the first needs a valid hardware
    /// signature over the app global auth key.
    pub fn set_local_recovery_progress(
        &self,
        progress: LocalRecoveryAttemptProgress,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        validate_transition(inner.state.local.as_ref(), &progress)?;
        inner.persistence.save_local_progress(&progress)?;

        info!(
            account = %progress.attempt.full_account_id,
            checkpoint = progress.checkpoint.name(),
            "Recovery checkpoint committed"
        );
        inner.state.local = Some(progress);
        self.publish(&inner.state);
        Ok(())
    }

    /// Replaces the cached server snapshot with the result of a poll.
    ///
    /// `None` only means "absent": a confirmed absence survives until local
    /// progress is cleared or a snapshot shows up again.
    pub fn set_active_server_recovery(
        &self,
        snapshot: Option<ServerRecovery>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let next = match snapshot {
            Some(recovery) => ServerRecoveryState::Present(recovery),
            None if inner.state.server == ServerRecoveryState::ConfirmedAbsent => {
                ServerRecoveryState::ConfirmedAbsent
            }
            None => ServerRecoveryState::Absent,
        };
        if next == inner.state.server {
            return Ok(());
        }

        inner.persistence.save_server_recovery(&next)?;
        debug!(server = next.as_str(), "Server recovery snapshot updated");
        inner.state.server = next;
        self.publish(&inner.state);
        Ok(())
    }

    /// Records that a re-check found no pending recovery on the server.
    pub fn confirm_server_recovery_absent(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.server == ServerRecoveryState::ConfirmedAbsent {
            return Ok(());
        }

        inner
            .persistence
            .save_server_recovery(&ServerRecoveryState::ConfirmedAbsent)?;
        info!("Server recovery absence confirmed");
        inner.state.server = ServerRecoveryState::ConfirmedAbsent;
        self.publish(&inner.state);
        Ok(())
    }

    /// Drops all local recovery state, session keys included.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.persistence.clear()?;
        info!(account = %self.identity.full_account_id, "Recovery state cleared");
        inner.state = PersistedRecoveryState::default();
        self.publish(&inner.state);
        Ok(())
    }

    pub fn save_session_keys(
        &self,
        sealed: &SealedSessionKeys,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<(), StoreError> {
        let inner = self.inner.lock();
        inner.persistence.save_session_keys(sealed, csek, ssek)?;
        Ok(())
    }

    pub fn session_key(&self, sealed: &[u8]) -> Result<Option<SymmetricKey>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.persistence.load_session_key(sealed)?)
    }

    /// Serializes multi-step transitions (pipeline steps, cancellation,
    /// initiation). Single writes don't need it.
    pub async fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        self.transition_lock.lock().await
    }

    fn publish(&self, state: &PersistedRecoveryState) {
        let recovery = reconcile(state.local.as_ref(), &state.server, &self.identity);
        self.recovery_tx.send_if_modified(|current| {
            if *current == recovery {
                false
            } else {
                *current = recovery;
                true
            }
        });
    }
}

fn validate_transition(
    current: Option<&LocalRecoveryAttemptProgress>,
    next: &LocalRecoveryAttemptProgress,
) -> Result<(), StoreError> {
    let to = next.checkpoint.name();
    match current {
        None if next.checkpoint.stage() != 0 => {
            return Err(StoreError::InvalidTransition { from: "None", to });
        }
        None => {}
        Some(current) => {
            if current.attempt != next.attempt {
                return Err(StoreError::AttemptMismatch);
            }
            let from = current.checkpoint.stage();
            let stage = next.checkpoint.stage();
            if stage != from && stage != from + 1 {
                return Err(StoreError::InvalidTransition {
                    from: current.checkpoint.name(),
                    to,
                });
            }
        }
    }

    if next.checkpoint.stage() > 0 {
        next.attempt.verify_hw_signature()?;
    }
    Ok(())
}
