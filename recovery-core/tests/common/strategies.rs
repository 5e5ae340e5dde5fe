// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable proptest strategies for reconciler and store properties.

use proptest::prelude::*;

use recovery_core::{
    F8eSpendingKeyset, FullAccountId, KeysetProgress, PendingRecoveryAttempt, PhysicalFactor,
    RecoveryCheckpoint, ServerRecoveryState,
};

use super::fixtures::{destination, original_keyset, sealed_keys, server_recovery, START};

// ============================================================
// Server Snapshot Strategies
// ============================================================

/// Shape of a server snapshot relative to a local attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerShape {
    Absent,
    ConfirmedAbsent,
    Matching,
    /// Same account, different destination keys.
    OtherDestination,
    /// Same account and keys, other lost factor.
    OtherFactor,
    /// Snapshot cached for a different account.
    OtherAccount,
}

pub fn server_shape_strategy() -> impl Strategy<Value = ServerShape> {
    prop_oneof![
        Just(ServerShape::Absent),
        Just(ServerShape::ConfirmedAbsent),
        Just(ServerShape::Matching),
        Just(ServerShape::OtherDestination),
        Just(ServerShape::OtherFactor),
        Just(ServerShape::OtherAccount),
    ]
}

pub fn conflicting_shape_strategy() -> impl Strategy<Value = ServerShape> {
    prop_oneof![
        Just(ServerShape::OtherDestination),
        Just(ServerShape::OtherFactor),
    ]
}

// ============================================================
// Checkpoint Strategies
// ============================================================

/// Strategy for pipeline stages, `CreatedPendingKeyBundles` to `BackedUpToCloud`.
pub fn stage_strategy() -> impl Strategy<Value = u8> {
    0u8..8
}

/// Builds the server state of the given shape for `attempt`.
pub fn server_state(shape: ServerShape, attempt: &PendingRecoveryAttempt) -> ServerRecoveryState {
    let mut recovery = server_recovery(attempt, START);
    match shape {
        ServerShape::Absent => return ServerRecoveryState::Absent,
        ServerShape::ConfirmedAbsent => return ServerRecoveryState::ConfirmedAbsent,
        ServerShape::Matching => {}
        ServerShape::OtherDestination => {
            recovery.destination = destination(200, attempt.destination.hardware);
        }
        ServerShape::OtherFactor => {
            recovery.lost_factor = match attempt.lost_factor {
                PhysicalFactor::App => PhysicalFactor::Hardware,
                PhysicalFactor::Hardware => PhysicalFactor::App,
            };
        }
        ServerShape::OtherAccount => {
            recovery.full_account_id = FullAccountId::new("urn:wallet-account:someone-else");
        }
    }
    ServerRecoveryState::Present(recovery)
}

/// Checkpoint at `stage` with fixture payloads.
pub fn checkpoint_at(stage: u8) -> RecoveryCheckpoint {
    let sealed = sealed_keys();
    let f8e_keyset = F8eSpendingKeyset {
        keyset_id: "keyset-new".into(),
        spending_public_key: "[ee/84'/0'/0']xpubNewServer/*".into(),
    };
    let progress = || KeysetProgress {
        sealed: sealed.clone(),
        f8e_keyset: f8e_keyset.clone(),
        keysets: vec![original_keyset()],
    };
    match stage {
        0 => RecoveryCheckpoint::CreatedPendingKeyBundles,
        1 => RecoveryCheckpoint::AttemptingCompletion {
            sealed: sealed.clone(),
        },
        2 => RecoveryCheckpoint::RotatedAuthKeys {
            sealed: sealed.clone(),
        },
        3 => RecoveryCheckpoint::CreatedSpendingKeys {
            sealed: sealed.clone(),
            f8e_keyset: f8e_keyset.clone(),
        },
        4 => RecoveryCheckpoint::UploadedDescriptorBackups(progress()),
        5 => RecoveryCheckpoint::ActivatedSpendingKeys(progress()),
        6 => RecoveryCheckpoint::DdkBackedUp(progress()),
        _ => RecoveryCheckpoint::BackedUpToCloud(progress()),
    }
}
