// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery Syncer
//!
//! Polls the server for the account's pending recovery and feeds each
//! snapshot into the [`RecoveryStore`]. Polling pauses while the app is in
//! the background and resumes with an immediate poll on return to the
//! foreground.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::f8e::RecoveryStatusSource;
use crate::keys::FullAccountId;

use super::error::{StoreError, SyncError};
use super::lifecycle::{AppSessionLifecycle, AppSessionState};
use super::model::LocalRecoveryAttemptProgress;
use super::store::RecoveryStore;

pub struct RecoverySyncer {
    store: Arc<RecoveryStore>,
    source: Arc<dyn RecoveryStatusSource>,
    lifecycle: AppSessionLifecycle,
}

impl RecoverySyncer {
    pub fn new(
        store: Arc<RecoveryStore>,
        source: Arc<dyn RecoveryStatusSource>,
        lifecycle: AppSessionLifecycle,
    ) -> Self {
        RecoverySyncer {
            store,
            source,
            lifecycle,
        }
    }

    pub fn store(&self) -> &Arc<RecoveryStore> {
        &self.store
    }

    /// Fetches the pending recovery once and stores it.
    ///
    /// On a fetch error the previous snapshot stays in place.
    pub async fn perform_sync(&self, account: &FullAccountId) -> Result<(), SyncError> {
        let snapshot = self.source.get_status(account).await?;
        self.store.set_active_server_recovery(snapshot)?;
        Ok(())
    }

    /// Starts the polling loop on the current tokio runtime.
    ///
    /// Runs until the returned handle is stopped or dropped.
    pub fn launch_sync(
        self: &Arc<Self>,
        account: FullAccountId,
        sync_frequency: Duration,
    ) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let syncer = Arc::clone(self);
        let task = tokio::spawn(async move {
            syncer.run(account, sync_frequency, shutdown_rx).await;
        });
        SyncHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(
        &self,
        account: FullAccountId,
        sync_frequency: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut lifecycle_rx = self.lifecycle.subscribe();
        debug!(account = %account, ?sync_frequency, "Recovery sync started");

        loop {
            loop {
                let state = *lifecycle_rx.borrow_and_update();
                if state == AppSessionState::Foreground {
                    break;
                }
                debug!("Recovery sync paused in background");
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    changed = lifecycle_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            if let Err(e) = self.perform_sync(&account).await {
                warn!(account = %account, error = %e, "Recovery status sync failed");
            }

            // Any session change ends the wait. The lifecycle only notifies on
            // real transitions, so Foreground here means a return from background.
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(sync_frequency) => {}
                changed = lifecycle_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(account = %account, "Recovery sync stopped");
    }

    pub fn set_local_recovery_progress(
        &self,
        progress: LocalRecoveryAttemptProgress,
    ) -> Result<(), StoreError> {
        self.store.set_local_recovery_progress(progress)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}

/// Handle on a running sync loop. Dropping it stops the loop.
pub struct SyncHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Stops the loop and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
