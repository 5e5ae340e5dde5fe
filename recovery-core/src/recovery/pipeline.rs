// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery Completion Pipeline
//!
//! Drives a recovery from `CreatedPendingKeyBundles` to a swept wallet.
//! Each call to [`RecoveryCompletionPipeline::advance`] runs exactly one
//! step, chosen by the persisted checkpoint, and commits the next
//! checkpoint only after the step's side effects succeeded. A failed step
//! leaves the checkpoint where it was, so retrying re-runs the same step.
//!
//! | checkpoint                  | step                      | hardware |
//! |-----------------------------|---------------------------|----------|
//! | `CreatedPendingKeyBundles`  | begin completion          | yes      |
//! | `AttemptingCompletion`      | rotate auth keys          |          |
//! | `RotatedAuthKeys`           | create spending keys      |          |
//! | `CreatedSpendingKeys`       | upload descriptor backups |          |
//! | `UploadedDescriptorBackups` | activate spending keys    | yes      |
//! | `ActivatedSpendingKeys`     | back up DDK               |          |
//! | `DdkBackedUp`               | back up to cloud          |          |
//! | `BackedUpToCloud`           | sweep funds, then clear   |          |

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::backup::{
    seal_descriptor_backups, CloudBackupRequest, CloudBackupUploader, DdkBackupService,
};
use crate::clock::Clock;
use crate::crypto::SymmetricKey;
use crate::f8e::{keyset_activation_challenge, AccountKeyService};
use crate::hardware::{HardwareSigner, HwSession};
use crate::keys::{BitcoinNetwork, F8eSpendingKeyset, SealedSessionKeys, SpendingKeyset};
use crate::sweep::SweepService;

use super::error::{CompletionStep, RecoveryStepError, StepFailure, StoreError, SyncError};
use super::model::{
    KeysetProgress, LocalRecoveryAttemptProgress, Recovery, RecoveryCheckpoint,
    ServerIndependentRecovery, ServerRecoveryState, StillRecovering,
};
use super::reconcile::reconcile;
use super::store::RecoveryStore;
use super::syncer::RecoverySyncer;

/// External services the pipeline calls into.
#[derive(Clone)]
pub struct CompletionServices {
    pub keys: Arc<dyn AccountKeyService>,
    pub hardware: Arc<dyn HardwareSigner>,
    pub cloud_backup: Arc<dyn CloudBackupUploader>,
    pub ddk_backup: Arc<dyn DdkBackupService>,
    pub sweep: Arc<dyn SweepService>,
    pub clock: Arc<dyn Clock>,
}

pub struct RecoveryCompletionPipeline {
    store: Arc<RecoveryStore>,
    syncer: Arc<RecoverySyncer>,
    services: CompletionServices,
    network: BitcoinNetwork,
}

impl RecoveryCompletionPipeline {
    pub fn new(
        store: Arc<RecoveryStore>,
        syncer: Arc<RecoverySyncer>,
        services: CompletionServices,
        network: BitcoinNetwork,
    ) -> Self {
        RecoveryCompletionPipeline {
            store,
            syncer,
            services,
            network,
        }
    }

    /// The step the next [`advance`](Self::advance) would run.
    pub fn next_step(&self) -> Option<CompletionStep> {
        self.store
            .local_progress()
            .map(|progress| step_for(&progress.checkpoint))
    }

    /// Runs the step for the current checkpoint and returns the newly
    /// rendered state.
    pub async fn advance(
        &self,
        hw_session: Option<&HwSession>,
    ) -> Result<Recovery, RecoveryStepError> {
        let _transition = self.store.lock_transitions().await;

        let state = self.store.state();
        let Some(progress) = state.local else {
            return Err(RecoveryStepError::new(
                CompletionStep::BeginCompletion,
                StepFailure::NoRecoveryInProgress,
            ));
        };
        let step = step_for(&progress.checkpoint);

        let rendered = reconcile(Some(&progress), &state.server, self.store.identity());
        if let Err(failure) = check_rendered(&rendered) {
            return Err(RecoveryStepError::new(step, failure));
        }

        debug!(
            account = %progress.attempt.full_account_id,
            step = %step,
            "Running recovery step"
        );
        let result = run_guarded(step, self.run_step(&progress, &state.server, hw_session)).await;
        match &result {
            Ok(()) => info!(step = %step, "Recovery step succeeded"),
            Err(e) => warn!(step = %step, error = %e.failure, "Recovery step failed"),
        }
        result.map(|()| self.store.current())
    }

    /// Re-runs the step that last failed. Steps are safe to repeat.
    pub async fn retry(
        &self,
        hw_session: Option<&HwSession>,
    ) -> Result<Recovery, RecoveryStepError> {
        self.advance(hw_session).await
    }

    /// Advances until the recovery is done and local state is cleared.
    pub async fn complete(&self, hw_session: Option<&HwSession>) -> Result<(), RecoveryStepError> {
        loop {
            if let Recovery::NoActiveRecovery = self.advance(hw_session).await? {
                return Ok(());
            }
        }
    }

    /// Resolves `MaybeNoLongerRecovering` with a fresh poll.
    ///
    /// If the snapshot is still absent, a completion attempt that has sealed
    /// its keys asks the server whether the destination auth key is already
    /// active; if so the rotation evidently landed and the checkpoint moves
    /// to `RotatedAuthKeys`. Otherwise the absence is confirmed and the
    /// store renders `NoLongerRecovering`.
    pub async fn recheck_recovery_status(&self) -> Result<Recovery, SyncError> {
        let _transition = self.store.lock_transitions().await;
        let account = self.store.identity().full_account_id.clone();

        self.syncer.perform_sync(&account).await?;

        let state = self.store.state();
        let Some(local) = state.local else {
            return Ok(self.store.current());
        };
        if local.checkpoint.is_server_independent() || state.server != ServerRecoveryState::Absent
        {
            return Ok(self.store.current());
        }

        if let RecoveryCheckpoint::AttemptingCompletion { sealed } = &local.checkpoint {
            let rotated = self
                .services
                .keys
                .is_auth_key_active(&account, &local.attempt.destination.app_global)
                .await?;
            if rotated {
                info!(account = %account, "Auth keys already rotated on server");
                self.store
                    .set_local_recovery_progress(local.advance(RecoveryCheckpoint::RotatedAuthKeys {
                        sealed: sealed.clone(),
                    }))?;
                return Ok(self.store.current());
            }
        }

        self.store.confirm_server_recovery_absent()?;
        Ok(self.store.current())
    }

    /// Discards local progress once the store renders `NoLongerRecovering`.
    pub async fn acknowledge_no_longer_recovering(&self) -> Result<(), StoreError> {
        let _transition = self.store.lock_transitions().await;
        if let Recovery::NoLongerRecovering { factor_to_recover } = self.store.current() {
            info!(factor = %factor_to_recover, "Discarding recovery no longer active on server");
            self.store.clear()?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        server: &ServerRecoveryState,
        hw_session: Option<&HwSession>,
    ) -> Result<(), StepFailure> {
        let attempt = &progress.attempt;
        let account = &attempt.full_account_id;

        match &progress.checkpoint {
            RecoveryCheckpoint::CreatedPendingKeyBundles => {
                let hw = hw_session.ok_or(StepFailure::HardwareSessionRequired)?;
                self.begin_completion(progress, server, hw).await
            }
            RecoveryCheckpoint::AttemptingCompletion { sealed } => {
                self.services
                    .keys
                    .rotate_auth_keys(
                        account,
                        &attempt.destination,
                        &attempt.app_global_auth_key_hw_signature,
                    )
                    .await?;
                self.commit(
                    progress,
                    RecoveryCheckpoint::RotatedAuthKeys {
                        sealed: sealed.clone(),
                    },
                )
            }
            RecoveryCheckpoint::RotatedAuthKeys { sealed } => {
                let f8e_keyset = self
                    .services
                    .keys
                    .create_spending_keyset(
                        account,
                        &attempt.app_spending_key,
                        &attempt.hw_spending_key,
                        self.network,
                    )
                    .await?;
                self.commit(
                    progress,
                    RecoveryCheckpoint::CreatedSpendingKeys {
                        sealed: sealed.clone(),
                        f8e_keyset,
                    },
                )
            }
            RecoveryCheckpoint::CreatedSpendingKeys { sealed, f8e_keyset } => {
                self.upload_descriptor_backups(progress, sealed, f8e_keyset)
                    .await
            }
            RecoveryCheckpoint::UploadedDescriptorBackups(keysets) => {
                let hw = hw_session.ok_or(StepFailure::HardwareSessionRequired)?;
                self.activate_spending_keys(progress, keysets, hw).await
            }
            RecoveryCheckpoint::ActivatedSpendingKeys(keysets) => {
                self.services
                    .ddk_backup
                    .back_up_ddk(account, &keysets.sealed.csek)
                    .await?;
                self.commit(progress, RecoveryCheckpoint::DdkBackedUp(keysets.clone()))
            }
            RecoveryCheckpoint::DdkBackedUp(keysets) => {
                self.back_up_to_cloud(progress, keysets).await
            }
            RecoveryCheckpoint::BackedUpToCloud(keysets) => {
                self.sweep_funds(progress, keysets).await
            }
        }
    }

    async fn begin_completion(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        server: &ServerRecoveryState,
        hw: &HwSession,
    ) -> Result<(), StepFailure> {
        let server = server.snapshot().ok_or(StepFailure::RecheckRequired)?;
        let now = self.services.clock.now();
        if !server.is_delay_complete(now) {
            return Err(StepFailure::DelayNotElapsed {
                remaining_secs: server.delay_end_time.saturating_sub(now),
            });
        }

        let csek = SymmetricKey::generate()?;
        let ssek = SymmetricKey::generate()?;
        let sealed = self
            .services
            .hardware
            .seal_session_keys(hw, &csek, &ssek)
            .await?;
        self.store.save_session_keys(&sealed, &csek, &ssek)?;

        self.commit(progress, RecoveryCheckpoint::AttemptingCompletion { sealed })
    }

    async fn upload_descriptor_backups(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        sealed: &SealedSessionKeys,
        f8e_keyset: &F8eSpendingKeyset,
    ) -> Result<(), StepFailure> {
        let attempt = &progress.attempt;
        let account = &attempt.full_account_id;
        let ssek = self
            .store
            .session_key(sealed.ssek.as_bytes())?
            .ok_or(StepFailure::MissingSessionKey)?;

        let mut keysets: Vec<SpendingKeyset> = self
            .services
            .keys
            .list_keysets(account)
            .await?
            .into_iter()
            .filter(|k| k.keyset_id() != f8e_keyset.keyset_id)
            .collect();
        keysets.push(SpendingKeyset::new(
            self.network,
            attempt.app_spending_key.clone(),
            attempt.hw_spending_key.clone(),
            f8e_keyset.clone(),
        ));

        let backups = seal_descriptor_backups(&keysets, &ssek)?;
        self.services
            .keys
            .upload_descriptor_backups(account, &backups)
            .await?;

        self.commit(
            progress,
            RecoveryCheckpoint::UploadedDescriptorBackups(KeysetProgress {
                sealed: sealed.clone(),
                f8e_keyset: f8e_keyset.clone(),
                keysets,
            }),
        )
    }

    async fn activate_spending_keys(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        keysets: &KeysetProgress,
        hw: &HwSession,
    ) -> Result<(), StepFailure> {
        let account = &progress.attempt.full_account_id;

        // Activation is the point of no return; make sure nobody else
        // started a recovery in the meantime.
        self.syncer.perform_sync(account).await?;
        let refreshed = self.store.state();
        match reconcile(
            refreshed.local.as_ref(),
            &refreshed.server,
            self.store.identity(),
        ) {
            Recovery::SomeoneElseIsRecovering(_) => return Err(StepFailure::ConflictingRecovery),
            Recovery::NoActiveRecovery => return Err(StepFailure::NoRecoveryInProgress),
            _ => {}
        }

        let new_keyset = keysets.new_keyset().ok_or(StepFailure::MissingKeyset)?;
        let challenge = keyset_activation_challenge(account, new_keyset.keyset_id());
        let proof = self.services.hardware.sign_challenge(hw, &challenge).await?;
        self.services
            .keys
            .activate_spending_keyset(account, new_keyset, &proof)
            .await?;

        self.commit(
            progress,
            RecoveryCheckpoint::ActivatedSpendingKeys(keysets.clone()),
        )
    }

    async fn back_up_to_cloud(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        keysets: &KeysetProgress,
    ) -> Result<(), StepFailure> {
        let csek = self
            .store
            .session_key(keysets.sealed.csek.as_bytes())?
            .ok_or(StepFailure::MissingSessionKey)?;
        let active_keyset = keysets
            .new_keyset()
            .ok_or(StepFailure::MissingKeyset)?
            .clone();

        let request = CloudBackupRequest {
            full_account_id: progress.attempt.full_account_id.clone(),
            auth_keys: progress.attempt.destination,
            active_keyset,
            keysets: keysets.keysets.clone(),
            sealed_csek: keysets.sealed.csek.clone(),
            csek,
        };
        self.services.cloud_backup.create_and_upload(&request).await?;

        self.commit(progress, RecoveryCheckpoint::BackedUpToCloud(keysets.clone()))
    }

    async fn sweep_funds(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        keysets: &KeysetProgress,
    ) -> Result<(), StepFailure> {
        let account = &progress.attempt.full_account_id;
        let destination = keysets.new_keyset().ok_or(StepFailure::MissingKeyset)?;
        let sources: Vec<SpendingKeyset> = keysets.old_keysets().into_iter().cloned().collect();

        match self
            .services
            .sweep
            .prepare_sweep(account, &sources, destination)
            .await?
        {
            Some(plan) => {
                let txid = self.services.sweep.broadcast(&plan).await?;
                info!(
                    account = %account,
                    txid = %txid,
                    amount_sats = plan.amount_sats,
                    "Sweep broadcast"
                );
            }
            None => info!(account = %account, "No funds to sweep"),
        }

        self.store.clear()?;
        info!(account = %account, "Recovery complete");
        Ok(())
    }

    fn commit(
        &self,
        progress: &LocalRecoveryAttemptProgress,
        checkpoint: RecoveryCheckpoint,
    ) -> Result<(), StepFailure> {
        self.store
            .set_local_recovery_progress(progress.advance(checkpoint))?;
        Ok(())
    }
}

fn step_for(checkpoint: &RecoveryCheckpoint) -> CompletionStep {
    match checkpoint {
        RecoveryCheckpoint::CreatedPendingKeyBundles => CompletionStep::BeginCompletion,
        RecoveryCheckpoint::AttemptingCompletion { .. } => CompletionStep::RotateAuthKeys,
        RecoveryCheckpoint::RotatedAuthKeys { .. } => CompletionStep::CreateSpendingKeys,
        RecoveryCheckpoint::CreatedSpendingKeys { .. } => CompletionStep::UploadDescriptorBackups,
        RecoveryCheckpoint::UploadedDescriptorBackups(_) => CompletionStep::ActivateSpendingKeys,
        RecoveryCheckpoint::ActivatedSpendingKeys(_) => CompletionStep::BackUpDdk,
        RecoveryCheckpoint::DdkBackedUp(_) => CompletionStep::BackUpToCloud,
        RecoveryCheckpoint::BackedUpToCloud(_) => CompletionStep::SweepFunds,
    }
}

/// Refuses to run while the rendered state says the attempt is in doubt.
fn check_rendered(rendered: &Recovery) -> Result<(), StepFailure> {
    match rendered {
        Recovery::StillRecovering(StillRecovering::ServerIndependent(
            ServerIndependentRecovery::MaybeNoLongerRecovering { .. },
        )) => Err(StepFailure::RecheckRequired),
        Recovery::StillRecovering(_) => Ok(()),
        Recovery::SomeoneElseIsRecovering(_) => Err(StepFailure::ConflictingRecovery),
        Recovery::NoLongerRecovering { .. } => Err(StepFailure::NoLongerRecovering),
        Recovery::NoActiveRecovery => Err(StepFailure::NoRecoveryInProgress),
    }
}

async fn run_guarded<F>(step: CompletionStep, step_future: F) -> Result<(), RecoveryStepError>
where
    F: Future<Output = Result<(), StepFailure>>,
{
    match AssertUnwindSafe(step_future).catch_unwind().await {
        Ok(result) => result.map_err(|failure| RecoveryStepError::new(step, failure)),
        Err(panic) => Err(RecoveryStepError::new(
            step,
            StepFailure::Unhandled(panic_message(panic.as_ref())),
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "step panicked");
    }

    #[test]
    fn test_steps_follow_checkpoints() {
        assert_eq!(
            step_for(&RecoveryCheckpoint::CreatedPendingKeyBundles),
            CompletionStep::BeginCompletion
        );
    }

    async fn exploding_step() -> Result<(), StepFailure> {
        panic!("sweep exploded")
    }

    #[tokio::test]
    async fn test_guard_maps_panics_to_unhandled() {
        let err = run_guarded(CompletionStep::SweepFunds, exploding_step())
            .await
            .unwrap_err();

        assert_eq!(err.step, CompletionStep::SweepFunds);
        assert!(matches!(err.failure, StepFailure::Unhandled(ref m) if m == "sweep exploded"));
    }
}
