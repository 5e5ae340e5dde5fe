// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cancellation of a delay-and-notify recovery.

use std::sync::Arc;

use tracing::{info, warn};

use crate::f8e::{F8eError, RecoveryStatusSource};
use crate::hardware::HwProofOfPossession;
use crate::keys::FullAccountId;

use super::error::CancelDelayNotifyError;
use super::store::RecoveryStore;

pub struct CancellationService {
    store: Arc<RecoveryStore>,
    source: Arc<dyn RecoveryStatusSource>,
}

impl CancellationService {
    pub fn new(store: Arc<RecoveryStore>, source: Arc<dyn RecoveryStatusSource>) -> Self {
        CancellationService { store, source }
    }

    /// Clears local progress, then cancels the server-side recovery.
    ///
    /// Waits for an in-flight pipeline step to finish first. `account` must
    /// be the session account. Cancelling is allowed up to and including
    /// `UploadedDescriptorBackups`, since nothing before activation changes
    /// which keyset holds funds. From `ActivatedSpendingKeys` on it is
    /// refused. A server reply of "no recovery exists" counts as success.
    pub async fn cancel_recovery(
        &self,
        account: &FullAccountId,
        hw_proof: Option<&HwProofOfPossession>,
    ) -> Result<(), CancelDelayNotifyError> {
        let _transition = self.store.lock_transitions().await;

        let session = &self.store.identity().full_account_id;
        if account != session {
            return Err(CancelDelayNotifyError::AccountMismatch {
                requested: account.to_string(),
                session: session.to_string(),
            });
        }

        if let Some(progress) = self.store.local_progress() {
            if progress.checkpoint.is_past_activation() {
                return Err(CancelDelayNotifyError::CancellationNotAllowed {
                    checkpoint: progress.checkpoint.name(),
                });
            }
        }

        self.store
            .clear()
            .map_err(CancelDelayNotifyError::Local)?;

        match self.source.cancel(account, hw_proof).await {
            Ok(()) => {
                info!(account = %account, "Recovery cancelled");
                Ok(())
            }
            Err(F8eError::NoRecoveryExists) => {
                info!(account = %account, "No recovery to cancel on server");
                Ok(())
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Server rejected recovery cancellation");
                Err(CancelDelayNotifyError::F8e(e))
            }
        }
    }
}
