// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Backups written while completing a recovery.
//!
//! - Descriptor backups: every keyset's output descriptor, encrypted under
//!   the SSEK and stored server-side.
//! - Cloud backup: the full app backup, encrypted under the CSEK.
//! - DDK backup: delegated decryption key material for social recovery.

mod fake;

pub use fake::{CloudBackupRecord, FakeCloudBackup, FakeDdkBackup};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{decrypt, encrypt, EncryptionError, SymmetricKey};
use crate::keys::{DestinationAuthKeys, FullAccountId, SealedCsek, SpendingKeyset};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    #[error("backup upload failed: {0}")]
    UploadFailed(String),

    #[error("cloud storage unavailable: {0}")]
    CloudUnavailable(String),

    #[error("backup encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("backup is malformed: {0}")]
    Malformed(String),
}

/// One keyset's descriptor, sealed under the SSEK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorBackup {
    pub keyset_id: String,
    pub sealed_descriptor: Vec<u8>,
}

/// Encrypts the descriptor of every keyset under `ssek`.
pub fn seal_descriptor_backups(
    keysets: &[SpendingKeyset],
    ssek: &SymmetricKey,
) -> Result<Vec<DescriptorBackup>, EncryptionError> {
    keysets
        .iter()
        .map(|keyset| {
            Ok(DescriptorBackup {
                keyset_id: keyset.keyset_id().to_string(),
                sealed_descriptor: encrypt(ssek, keyset.descriptor().as_bytes())?,
            })
        })
        .collect()
}

/// Decrypts a descriptor backup back to its descriptor string.
pub fn open_descriptor_backup(
    backup: &DescriptorBackup,
    ssek: &SymmetricKey,
) -> Result<String, BackupError> {
    let plaintext = decrypt(ssek, &backup.sealed_descriptor)?;
    String::from_utf8(plaintext).map_err(|e| BackupError::Malformed(e.to_string()))
}

/// Everything the cloud backup captures after recovery.
#[derive(Debug, Clone)]
pub struct CloudBackupRequest {
    pub full_account_id: FullAccountId,
    pub auth_keys: DestinationAuthKeys,
    pub active_keyset: SpendingKeyset,
    pub keysets: Vec<SpendingKeyset>,
    pub sealed_csek: SealedCsek,
    pub csek: SymmetricKey,
}

#[async_trait]
pub trait CloudBackupUploader: Send + Sync {
    /// Builds the backup, encrypts it under the CSEK and uploads it,
    /// replacing any previous backup.
    async fn create_and_upload(&self, request: &CloudBackupRequest) -> Result<(), BackupError>;
}

#[async_trait]
pub trait DdkBackupService: Send + Sync {
    async fn back_up_ddk(
        &self,
        account: &FullAccountId,
        sealed_csek: &SealedCsek,
    ) -> Result<(), BackupError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AppSpendingPublicKey, BitcoinNetwork, F8eSpendingKeyset, HwSpendingPublicKey};

    fn keyset(id: &str) -> SpendingKeyset {
        SpendingKeyset::new(
            BitcoinNetwork::Signet,
            AppSpendingPublicKey(format!("app-{}", id)),
            HwSpendingPublicKey(format!("hw-{}", id)),
            F8eSpendingKeyset {
                keyset_id: id.to_string(),
                spending_public_key: format!("server-{}", id),
            },
        )
    }

    #[test]
    fn test_descriptor_backups_cover_every_keyset() {
        let ssek = SymmetricKey::generate().unwrap();
        let keysets = vec![keyset("old"), keyset("new")];

        let backups = seal_descriptor_backups(&keysets, &ssek).unwrap();

        assert_eq!(backups.len(), 2);
        assert_eq!(backups[1].keyset_id, "new");
        assert_eq!(
            open_descriptor_backup(&backups[1], &ssek).unwrap(),
            keysets[1].descriptor()
        );
    }

    #[test]
    fn test_descriptor_backup_needs_ssek() {
        let ssek = SymmetricKey::generate().unwrap();
        let wrong = SymmetricKey::generate().unwrap();
        let backups = seal_descriptor_backups(&[keyset("k")], &ssek).unwrap();

        assert_eq!(
            open_descriptor_backup(&backups[0], &wrong).unwrap_err(),
            BackupError::Encryption(EncryptionError::DecryptionFailed)
        );
    }
}
