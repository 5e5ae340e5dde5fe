// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery state model.
//!
//! Two independently mutable inputs feed the rendered [`Recovery`]:
//! - [`LocalRecoveryAttemptProgress`]: this device's checkpoint, overwritten
//!   on every pipeline transition.
//! - [`ServerRecoveryState`]: the last snapshot fetched from the server.

use serde::{Deserialize, Serialize};

use crate::crypto::SignatureError;
use crate::keys::{
    verify_app_global_auth_key_signature, AppSpendingPublicKey, DestinationAuthKeys,
    F8eSpendingKeyset, FullAccountId, HwSignature, HwSpendingPublicKey, PhysicalFactor,
    SealedSessionKeys, SpendingKeyset,
};

// =============================================================================
// Server snapshot
// =============================================================================

/// Pending recovery as reported by the server. Refreshed wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecovery {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    /// Unix seconds.
    pub delay_start_time: u64,
    /// Unix seconds.
    pub delay_end_time: u64,
    pub destination: DestinationAuthKeys,
}

impl ServerRecovery {
    /// True when this snapshot describes the given local attempt.
    pub fn matches(&self, attempt: &PendingRecoveryAttempt) -> bool {
        self.full_account_id == attempt.full_account_id
            && self.lost_factor == attempt.lost_factor
            && self.destination == attempt.destination
    }

    pub fn is_delay_complete(&self, now: u64) -> bool {
        now >= self.delay_end_time
    }
}

/// What the store knows about the server's view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerRecoveryState {
    /// Last poll returned a pending recovery.
    Present(ServerRecovery),
    /// Last poll returned nothing, or no poll has happened yet.
    #[default]
    Absent,
    /// An explicit re-check confirmed that nothing is pending.
    ConfirmedAbsent,
}

impl ServerRecoveryState {
    pub fn snapshot(&self) -> Option<&ServerRecovery> {
        match self {
            ServerRecoveryState::Present(recovery) => Some(recovery),
            _ => None,
        }
    }

    /// Stable name used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRecoveryState::Present(_) => "present",
            ServerRecoveryState::Absent => "absent",
            ServerRecoveryState::ConfirmedAbsent => "confirmed_absent",
        }
    }
}

// =============================================================================
// Local progress
// =============================================================================

/// Everything generated locally when the recovery was initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecoveryAttempt {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub destination: DestinationAuthKeys,
    pub app_spending_key: AppSpendingPublicKey,
    pub hw_spending_key: HwSpendingPublicKey,
    /// Hardware signature over `destination.app_global`.
    pub app_global_auth_key_hw_signature: HwSignature,
}

impl PendingRecoveryAttempt {
    /// The factor being replaced.
    pub fn factor_to_recover(&self) -> PhysicalFactor {
        self.lost_factor
    }

    /// Checks the hardware signature against the destination hardware key,
    /// which is the hardware that will be active once recovery completes.
    pub fn verify_hw_signature(&self) -> Result<(), SignatureError> {
        verify_app_global_auth_key_signature(
            &self.destination.hardware,
            &self.destination.app_global,
            &self.app_global_auth_key_hw_signature,
        )
    }
}

/// Keyset data accumulated once the new server keyset exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetProgress {
    pub sealed: SealedSessionKeys,
    pub f8e_keyset: F8eSpendingKeyset,
    /// Every keyset of the account, historical ones included. The new keyset is last.
    pub keysets: Vec<SpendingKeyset>,
}

impl KeysetProgress {
    /// The keyset being activated by this recovery.
    pub fn new_keyset(&self) -> Option<&SpendingKeyset> {
        self.keysets
            .iter()
            .find(|k| k.f8e_keyset.keyset_id == self.f8e_keyset.keyset_id)
    }

    /// Keysets that may still hold funds after activation.
    pub fn old_keysets(&self) -> Vec<&SpendingKeyset> {
        self.keysets
            .iter()
            .filter(|k| k.f8e_keyset.keyset_id != self.f8e_keyset.keyset_id)
            .collect()
    }
}

/// Last committed step of the completion pipeline.
///
/// Each variant carries what is needed to resume from exactly that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryCheckpoint {
    CreatedPendingKeyBundles,
    AttemptingCompletion {
        sealed: SealedSessionKeys,
    },
    RotatedAuthKeys {
        sealed: SealedSessionKeys,
    },
    CreatedSpendingKeys {
        sealed: SealedSessionKeys,
        f8e_keyset: F8eSpendingKeyset,
    },
    UploadedDescriptorBackups(KeysetProgress),
    ActivatedSpendingKeys(KeysetProgress),
    DdkBackedUp(KeysetProgress),
    BackedUpToCloud(KeysetProgress),
}

impl RecoveryCheckpoint {
    /// Position in the pipeline, starting at 0.
    pub fn stage(&self) -> u8 {
        match self {
            RecoveryCheckpoint::CreatedPendingKeyBundles => 0,
            RecoveryCheckpoint::AttemptingCompletion { .. } => 1,
            RecoveryCheckpoint::RotatedAuthKeys { .. } => 2,
            RecoveryCheckpoint::CreatedSpendingKeys { .. } => 3,
            RecoveryCheckpoint::UploadedDescriptorBackups(_) => 4,
            RecoveryCheckpoint::ActivatedSpendingKeys(_) => 5,
            RecoveryCheckpoint::DdkBackedUp(_) => 6,
            RecoveryCheckpoint::BackedUpToCloud(_) => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecoveryCheckpoint::CreatedPendingKeyBundles => "CreatedPendingKeyBundles",
            RecoveryCheckpoint::AttemptingCompletion { .. } => "AttemptingCompletion",
            RecoveryCheckpoint::RotatedAuthKeys { .. } => "RotatedAuthKeys",
            RecoveryCheckpoint::CreatedSpendingKeys { .. } => "CreatedSpendingKeys",
            RecoveryCheckpoint::UploadedDescriptorBackups(_) => "UploadedDescriptorBackups",
            RecoveryCheckpoint::ActivatedSpendingKeys(_) => "ActivatedSpendingKeys",
            RecoveryCheckpoint::DdkBackedUp(_) => "DdkBackedUp",
            RecoveryCheckpoint::BackedUpToCloud(_) => "BackedUpToCloud",
        }
    }

    /// Once auth keys are rotated the remaining steps no longer need the
    /// server's pending recovery, so a missing snapshot can't roll them back.
    pub fn is_server_independent(&self) -> bool {
        self.stage() >= 2
    }

    pub fn sealed(&self) -> Option<&SealedSessionKeys> {
        match self {
            RecoveryCheckpoint::CreatedPendingKeyBundles => None,
            RecoveryCheckpoint::AttemptingCompletion { sealed }
            | RecoveryCheckpoint::RotatedAuthKeys { sealed }
            | RecoveryCheckpoint::CreatedSpendingKeys { sealed, .. } => Some(sealed),
            RecoveryCheckpoint::UploadedDescriptorBackups(p)
            | RecoveryCheckpoint::ActivatedSpendingKeys(p)
            | RecoveryCheckpoint::DdkBackedUp(p)
            | RecoveryCheckpoint::BackedUpToCloud(p) => Some(&p.sealed),
        }
    }

    /// The new keyset is authoritative server-side from this point on.
    pub fn is_past_activation(&self) -> bool {
        self.stage() >= 5
    }
}

/// Persisted progress of this device's recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecoveryAttemptProgress {
    pub attempt: PendingRecoveryAttempt,
    pub checkpoint: RecoveryCheckpoint,
}

impl LocalRecoveryAttemptProgress {
    pub fn new(attempt: PendingRecoveryAttempt) -> Self {
        LocalRecoveryAttemptProgress {
            attempt,
            checkpoint: RecoveryCheckpoint::CreatedPendingKeyBundles,
        }
    }

    /// Same attempt, next checkpoint.
    pub fn advance(&self, checkpoint: RecoveryCheckpoint) -> Self {
        LocalRecoveryAttemptProgress {
            attempt: self.attempt.clone(),
            checkpoint,
        }
    }
}

// =============================================================================
// Rendered state
// =============================================================================

/// The single derived recovery state the rest of the app renders against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    NoActiveRecovery,
    /// The server reports a recovery this device has no progress for.
    SomeoneElseIsRecovering(ServerRecovery),
    StillRecovering(StillRecovering),
    /// The server confirmed the recovery is gone. Local progress must be discarded.
    NoLongerRecovering { factor_to_recover: PhysicalFactor },
}

impl Recovery {
    pub fn still_recovering(&self) -> Option<&StillRecovering> {
        match self {
            Recovery::StillRecovering(still) => Some(still),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StillRecovering {
    ServerDependent(ServerDependentRecovery),
    ServerIndependent(ServerIndependentRecovery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerDependentRecovery {
    InitiatedRecovery(InitiatedRecovery),
}

/// Recovery waiting out (or done waiting out) its delay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedRecovery {
    pub attempt: PendingRecoveryAttempt,
    pub delay_start_time: u64,
    pub delay_end_time: u64,
}

impl InitiatedRecovery {
    /// Seconds left in the delay window.
    pub fn delay_remaining(&self, now: u64) -> u64 {
        self.delay_end_time.saturating_sub(now)
    }

    pub fn can_complete(&self, now: u64) -> bool {
        now >= self.delay_end_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerIndependentRecovery {
    AttemptingCompletion {
        attempt: PendingRecoveryAttempt,
        sealed: SealedSessionKeys,
    },
    RotatedAuthKeys {
        attempt: PendingRecoveryAttempt,
        sealed: SealedSessionKeys,
    },
    CreatedSpendingKeys {
        attempt: PendingRecoveryAttempt,
        sealed: SealedSessionKeys,
        f8e_keyset: F8eSpendingKeyset,
    },
    UploadedDescriptorBackups {
        attempt: PendingRecoveryAttempt,
        progress: KeysetProgress,
    },
    ActivatedSpendingKeys {
        attempt: PendingRecoveryAttempt,
        progress: KeysetProgress,
    },
    DdkBackedUp {
        attempt: PendingRecoveryAttempt,
        progress: KeysetProgress,
    },
    BackedUpToCloud {
        attempt: PendingRecoveryAttempt,
        progress: KeysetProgress,
    },
    /// Local progress exists but the server snapshot just went absent.
    /// Resolved by an explicit re-check, never by guessing.
    MaybeNoLongerRecovering {
        attempt: PendingRecoveryAttempt,
        checkpoint: RecoveryCheckpoint,
    },
}

impl StillRecovering {
    pub fn attempt(&self) -> &PendingRecoveryAttempt {
        match self {
            StillRecovering::ServerDependent(ServerDependentRecovery::InitiatedRecovery(i)) => {
                &i.attempt
            }
            StillRecovering::ServerIndependent(s) => match s {
                ServerIndependentRecovery::AttemptingCompletion { attempt, .. }
                | ServerIndependentRecovery::RotatedAuthKeys { attempt, .. }
                | ServerIndependentRecovery::CreatedSpendingKeys { attempt, .. }
                | ServerIndependentRecovery::UploadedDescriptorBackups { attempt, .. }
                | ServerIndependentRecovery::ActivatedSpendingKeys { attempt, .. }
                | ServerIndependentRecovery::DdkBackedUp { attempt, .. }
                | ServerIndependentRecovery::BackedUpToCloud { attempt, .. }
                | ServerIndependentRecovery::MaybeNoLongerRecovering { attempt, .. } => attempt,
            },
        }
    }

    pub fn full_account_id(&self) -> &FullAccountId {
        &self.attempt().full_account_id
    }

    pub fn factor_to_recover(&self) -> PhysicalFactor {
        self.attempt().lost_factor
    }

    pub fn app_spending_key(&self) -> &AppSpendingPublicKey {
        &self.attempt().app_spending_key
    }

    pub fn hw_spending_key(&self) -> &HwSpendingPublicKey {
        &self.attempt().hw_spending_key
    }
}
