// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Initiation of a delay-and-notify recovery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::f8e::{F8eError, InitiateRecoveryRequest, RecoveryStatusSource};
use crate::hardware::{HardwareError, HardwareSigner, HwProofOfPossession, HwSession};
use crate::keys::{
    AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey, AppSpendingPublicKey, BitcoinNetwork,
    DestinationAuthKeys, FullAccountId, PhysicalFactor,
};

use super::error::InitiateRecoveryError;
use super::model::{LocalRecoveryAttemptProgress, PendingRecoveryAttempt, ServerRecovery};
use super::store::RecoveryStore;

pub struct RecoveryInitiator {
    store: Arc<RecoveryStore>,
    source: Arc<dyn RecoveryStatusSource>,
}

impl RecoveryInitiator {
    pub fn new(store: Arc<RecoveryStore>, source: Arc<dyn RecoveryStatusSource>) -> Self {
        RecoveryInitiator { store, source }
    }

    /// Starts a recovery for `attempt`.
    ///
    /// Local progress is written before the server call and removed again
    /// if the call fails.
    pub async fn initiate(
        &self,
        attempt: PendingRecoveryAttempt,
        hw_proof: Option<HwProofOfPossession>,
        delay_period: Duration,
    ) -> Result<ServerRecovery, InitiateRecoveryError> {
        let _transition = self.store.lock_transitions().await;

        let session = &self.store.identity().full_account_id;
        if &attempt.full_account_id != session {
            return Err(InitiateRecoveryError::AccountMismatch {
                requested: attempt.full_account_id.to_string(),
                session: session.to_string(),
            });
        }
        attempt.verify_hw_signature()?;
        if self.store.local_progress().is_some() {
            return Err(InitiateRecoveryError::AlreadyRecovering);
        }

        self.store
            .set_local_recovery_progress(LocalRecoveryAttemptProgress::new(attempt.clone()))?;

        let request = InitiateRecoveryRequest {
            full_account_id: attempt.full_account_id.clone(),
            lost_factor: attempt.lost_factor,
            destination: attempt.destination,
            hw_proof,
            delay_period,
        };
        match self.source.initiate(request).await {
            Ok(server) => {
                self.store.set_active_server_recovery(Some(server.clone()))?;
                info!(
                    account = %attempt.full_account_id,
                    lost_factor = %attempt.lost_factor,
                    delay_end_time = server.delay_end_time,
                    "Recovery initiated"
                );
                Ok(server)
            }
            Err(e) => {
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "Failed to discard progress of rejected recovery");
                }
                match e {
                    F8eError::RecoveryAlreadyExists => Err(InitiateRecoveryError::RecoveryConflict),
                    e => Err(InitiateRecoveryError::F8e(e)),
                }
            }
        }
    }
}

/// Public keys the app generated for the replacement key bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppKeyBundle {
    pub app_global: AppGlobalAuthPublicKey,
    pub app_recovery: AppRecoveryAuthPublicKey,
    pub app_spending: AppSpendingPublicKey,
}

/// Pairs the app's new keys with the destination hardware's keys.
///
/// Needs a live session with the hardware that will be active once the
/// recovery completes: its auth key and spending key go into the bundle
/// and it signs the new app global auth key.
pub async fn create_pending_key_bundles(
    hardware: &dyn HardwareSigner,
    session: &HwSession,
    account: FullAccountId,
    lost_factor: PhysicalFactor,
    app_keys: AppKeyBundle,
    network: BitcoinNetwork,
) -> Result<PendingRecoveryAttempt, HardwareError> {
    let hw_auth = hardware.auth_public_key(session).await?;
    let hw_spending_key = hardware.spending_public_key(session, network).await?;
    let signature = hardware
        .sign_app_global_auth_key(session, &app_keys.app_global)
        .await?;
    debug!(account = %account, lost_factor = %lost_factor, "Pending key bundles created");

    Ok(PendingRecoveryAttempt {
        full_account_id: account,
        lost_factor,
        destination: DestinationAuthKeys {
            app_global: app_keys.app_global,
            app_recovery: app_keys.app_recovery,
            hardware: hw_auth,
        },
        app_spending_key: app_keys.app_spending,
        hw_spending_key,
        app_global_auth_key_hw_signature: signature,
    })
}
