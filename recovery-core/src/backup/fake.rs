// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory backup services.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::crypto::{decrypt, encrypt, SymmetricKey};
use crate::fault::FaultPlan;
use crate::keys::{FullAccountId, SealedCsek};

use super::{BackupError, CloudBackupRequest, CloudBackupUploader, DdkBackupService};

/// An uploaded cloud backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudBackupRecord {
    pub full_account_id: FullAccountId,
    pub active_keyset_id: String,
    pub ciphertext: Vec<u8>,
}

#[derive(Serialize)]
struct CloudBackupPayload<'a> {
    account: &'a str,
    active_keyset: &'a str,
    descriptors: Vec<String>,
}

/// Cloud backup store that keeps only the latest upload per account.
pub struct FakeCloudBackup {
    uploads: Mutex<Vec<CloudBackupRecord>>,
    faults: FaultPlan<(), BackupError>,
}

impl FakeCloudBackup {
    pub fn new() -> Self {
        FakeCloudBackup {
            uploads: Mutex::new(Vec::new()),
            faults: FaultPlan::new(),
        }
    }

    pub fn fail_next(&self, error: BackupError) {
        self.faults.fail_next((), error);
    }

    pub fn upload_attempts(&self) -> usize {
        self.faults.calls(())
    }

    pub fn latest(&self, account: &FullAccountId) -> Option<CloudBackupRecord> {
        self.uploads
            .lock()
            .iter()
            .find(|r| &r.full_account_id == account)
            .cloned()
    }

    /// Decrypts the latest backup and returns the descriptors it holds.
    pub fn open_latest(
        &self,
        account: &FullAccountId,
        csek: &SymmetricKey,
    ) -> Result<Vec<String>, BackupError> {
        let record = self
            .latest(account)
            .ok_or_else(|| BackupError::Malformed("no backup uploaded".into()))?;
        let plaintext = decrypt(csek, &record.ciphertext)?;
        let value: serde_json::Value = serde_json::from_slice(&plaintext)
            .map_err(|e| BackupError::Malformed(e.to_string()))?;
        Ok(value["descriptors"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|d| d.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Default for FakeCloudBackup {
    fn default() -> Self {
        FakeCloudBackup::new()
    }
}

#[async_trait]
impl CloudBackupUploader for FakeCloudBackup {
    async fn create_and_upload(&self, request: &CloudBackupRequest) -> Result<(), BackupError> {
        self.faults.check(())?;

        let payload = CloudBackupPayload {
            account: request.full_account_id.as_str(),
            active_keyset: request.active_keyset.keyset_id(),
            descriptors: request.keysets.iter().map(|k| k.descriptor()).collect(),
        };
        let plaintext =
            serde_json::to_vec(&payload).map_err(|e| BackupError::Malformed(e.to_string()))?;
        let ciphertext = encrypt(&request.csek, &plaintext)?;

        let mut uploads = self.uploads.lock();
        uploads.retain(|r| r.full_account_id != request.full_account_id);
        uploads.push(CloudBackupRecord {
            full_account_id: request.full_account_id.clone(),
            active_keyset_id: request.active_keyset.keyset_id().to_string(),
            ciphertext,
        });
        Ok(())
    }
}

/// DDK backup service that records which accounts were backed up.
pub struct FakeDdkBackup {
    backed_up: Mutex<Vec<(FullAccountId, SealedCsek)>>,
    faults: FaultPlan<(), BackupError>,
}

impl FakeDdkBackup {
    pub fn new() -> Self {
        FakeDdkBackup {
            backed_up: Mutex::new(Vec::new()),
            faults: FaultPlan::new(),
        }
    }

    pub fn fail_next(&self, error: BackupError) {
        self.faults.fail_next((), error);
    }

    pub fn backup_attempts(&self) -> usize {
        self.faults.calls(())
    }

    pub fn is_backed_up(&self, account: &FullAccountId) -> bool {
        self.backed_up.lock().iter().any(|(a, _)| a == account)
    }
}

impl Default for FakeDdkBackup {
    fn default() -> Self {
        FakeDdkBackup::new()
    }
}

#[async_trait]
impl DdkBackupService for FakeDdkBackup {
    async fn back_up_ddk(
        &self,
        account: &FullAccountId,
        sealed_csek: &SealedCsek,
    ) -> Result<(), BackupError> {
        self.faults.check(())?;
        let mut backed_up = self.backed_up.lock();
        backed_up.retain(|(a, _)| a != account);
        backed_up.push((account.clone(), sealed_csek.clone()));
        Ok(())
    }
}
