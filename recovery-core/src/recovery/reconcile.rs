// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery state reconciliation.
//!
//! Pure derivation of [`Recovery`] from local progress and the server
//! snapshot. Re-run by the store after every write.
//!
//! | local    | server                      | result                          |
//! |----------|-----------------------------|---------------------------------|
//! | none     | none                        | `NoActiveRecovery`              |
//! | none     | present                     | `SomeoneElseIsRecovering`       |
//! | any      | present, different keys     | `SomeoneElseIsRecovering`       |
//! | stage<2  | present, matching           | checkpoint                      |
//! | stage<2  | absent                      | `MaybeNoLongerRecovering`       |
//! | stage<2  | confirmed absent            | `NoLongerRecovering`            |
//! | stage>=2 | matching / absent           | checkpoint                      |

use crate::keys::FullAccountId;

use super::model::{
    InitiatedRecovery, LocalRecoveryAttemptProgress, Recovery, RecoveryCheckpoint,
    ServerDependentRecovery, ServerIndependentRecovery, ServerRecovery, ServerRecoveryState,
    StillRecovering,
};

/// The account this app instance is signed in to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub full_account_id: FullAccountId,
}

impl SessionIdentity {
    pub fn new(full_account_id: FullAccountId) -> Self {
        SessionIdentity { full_account_id }
    }
}

/// Derives the rendered recovery state.
pub fn reconcile(
    local: Option<&LocalRecoveryAttemptProgress>,
    server: &ServerRecoveryState,
    identity: &SessionIdentity,
) -> Recovery {
    // A snapshot cached for another account says nothing about this one.
    let absent = ServerRecoveryState::Absent;
    let server = match server {
        ServerRecoveryState::Present(recovery)
            if recovery.full_account_id != identity.full_account_id =>
        {
            &absent
        }
        other => other,
    };

    let Some(local) = local else {
        return match server {
            ServerRecoveryState::Present(recovery) => {
                Recovery::SomeoneElseIsRecovering(recovery.clone())
            }
            ServerRecoveryState::Absent | ServerRecoveryState::ConfirmedAbsent => {
                Recovery::NoActiveRecovery
            }
        };
    };

    if let ServerRecoveryState::Present(recovery) = server {
        if !recovery.matches(&local.attempt) {
            return Recovery::SomeoneElseIsRecovering(recovery.clone());
        }
    }

    if local.checkpoint.is_server_independent() {
        return Recovery::StillRecovering(checkpoint_view(local, None));
    }

    match server {
        ServerRecoveryState::Present(recovery) => {
            Recovery::StillRecovering(checkpoint_view(local, Some(recovery)))
        }
        ServerRecoveryState::Absent => Recovery::StillRecovering(
            StillRecovering::ServerIndependent(ServerIndependentRecovery::MaybeNoLongerRecovering {
                attempt: local.attempt.clone(),
                checkpoint: local.checkpoint.clone(),
            }),
        ),
        ServerRecoveryState::ConfirmedAbsent => Recovery::NoLongerRecovering {
            factor_to_recover: local.attempt.lost_factor,
        },
    }
}

fn checkpoint_view(
    local: &LocalRecoveryAttemptProgress,
    server: Option<&ServerRecovery>,
) -> StillRecovering {
    let attempt = local.attempt.clone();
    let independent = match &local.checkpoint {
        RecoveryCheckpoint::CreatedPendingKeyBundles => {
            // Only reachable with a matching snapshot; without one the caller
            // has already rendered MaybeNoLongerRecovering or NoLongerRecovering.
            let (delay_start_time, delay_end_time) = server
                .map(|s| (s.delay_start_time, s.delay_end_time))
                .unwrap_or_default();
            return StillRecovering::ServerDependent(ServerDependentRecovery::InitiatedRecovery(
                InitiatedRecovery {
                    attempt,
                    delay_start_time,
                    delay_end_time,
                },
            ));
        }
        RecoveryCheckpoint::AttemptingCompletion { sealed } => {
            ServerIndependentRecovery::AttemptingCompletion {
                attempt,
                sealed: sealed.clone(),
            }
        }
        RecoveryCheckpoint::RotatedAuthKeys { sealed } => {
            ServerIndependentRecovery::RotatedAuthKeys {
                attempt,
                sealed: sealed.clone(),
            }
        }
        RecoveryCheckpoint::CreatedSpendingKeys { sealed, f8e_keyset } => {
            ServerIndependentRecovery::CreatedSpendingKeys {
                attempt,
                sealed: sealed.clone(),
                f8e_keyset: f8e_keyset.clone(),
            }
        }
        RecoveryCheckpoint::UploadedDescriptorBackups(progress) => {
            ServerIndependentRecovery::UploadedDescriptorBackups {
                attempt,
                progress: progress.clone(),
            }
        }
        RecoveryCheckpoint::ActivatedSpendingKeys(progress) => {
            ServerIndependentRecovery::ActivatedSpendingKeys {
                attempt,
                progress: progress.clone(),
            }
        }
        RecoveryCheckpoint::DdkBackedUp(progress) => ServerIndependentRecovery::DdkBackedUp {
            attempt,
            progress: progress.clone(),
        },
        RecoveryCheckpoint::BackedUpToCloud(progress) => {
            ServerIndependentRecovery::BackedUpToCloud {
                attempt,
                progress: progress.clone(),
            }
        }
    };
    StillRecovering::ServerIndependent(independent)
}
