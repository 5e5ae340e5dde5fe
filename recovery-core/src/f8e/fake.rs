// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory server.
//!
//! Models the server side of delay-and-notify: one pending recovery per
//! account, auth key rotation gated on the delay window, and keyset
//! activation gated on a hardware proof from the account's hardware key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backup::DescriptorBackup;
use crate::clock::Clock;
use crate::fault::FaultPlan;
use crate::hardware::HwProofOfPossession;
use crate::keys::{
    AppGlobalAuthPublicKey, AppSpendingPublicKey, BitcoinNetwork, DestinationAuthKeys,
    F8eSpendingKeyset, FullAccountId, HwSignature, HwSpendingPublicKey, SpendingKeyset,
};
use crate::recovery::ServerRecovery;

use super::{
    keyset_activation_challenge, recovery_challenge, AccountKeyService, F8eError,
    InitiateRecoveryRequest, RecoveryStatusSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum F8eCall {
    GetStatus,
    Initiate,
    Cancel,
    RotateAuthKeys,
    IsAuthKeyActive,
    CreateSpendingKeyset,
    ListKeysets,
    UploadDescriptorBackups,
    ActivateSpendingKeyset,
}

#[derive(Default)]
struct AccountState {
    pending: Option<ServerRecovery>,
    auth_keys: Option<DestinationAuthKeys>,
    /// Created but not yet activated.
    created: Vec<F8eSpendingKeyset>,
    keysets: Vec<SpendingKeyset>,
    active_keyset_id: Option<String>,
    descriptor_backups: Vec<DescriptorBackup>,
}

pub struct FakeF8e {
    accounts: Mutex<HashMap<FullAccountId, AccountState>>,
    clock: Arc<dyn Clock>,
    faults: FaultPlan<F8eCall, F8eError>,
}

impl FakeF8e {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        FakeF8e {
            accounts: Mutex::new(HashMap::new()),
            clock,
            faults: FaultPlan::new(),
        }
    }

    pub fn fail_next(&self, call: F8eCall, error: F8eError) {
        self.faults.fail_next(call, error);
    }

    pub fn calls(&self, call: F8eCall) -> usize {
        self.faults.calls(call)
    }

    /// Sets the account's current auth keys.
    pub fn set_auth_keys(&self, account: &FullAccountId, keys: DestinationAuthKeys) {
        self.accounts.lock().entry(account.clone()).or_default().auth_keys = Some(keys);
    }

    /// Adds an already-active keyset to the account.
    pub fn add_keyset(&self, account: &FullAccountId, keyset: SpendingKeyset) {
        let mut accounts = self.accounts.lock();
        let state = accounts.entry(account.clone()).or_default();
        state.active_keyset_id = Some(keyset.keyset_id().to_string());
        state.keysets.push(keyset);
    }

    /// Installs a pending recovery as if another device had initiated it.
    pub fn set_pending_recovery(&self, recovery: ServerRecovery) {
        let account = recovery.full_account_id.clone();
        self.accounts.lock().entry(account).or_default().pending = Some(recovery);
    }

    pub fn clear_pending_recovery(&self, account: &FullAccountId) {
        if let Some(state) = self.accounts.lock().get_mut(account) {
            state.pending = None;
        }
    }

    pub fn pending_recovery(&self, account: &FullAccountId) -> Option<ServerRecovery> {
        self.accounts
            .lock()
            .get(account)
            .and_then(|s| s.pending.clone())
    }

    pub fn auth_keys(&self, account: &FullAccountId) -> Option<DestinationAuthKeys> {
        self.accounts.lock().get(account).and_then(|s| s.auth_keys)
    }

    pub fn active_keyset_id(&self, account: &FullAccountId) -> Option<String> {
        self.accounts
            .lock()
            .get(account)
            .and_then(|s| s.active_keyset_id.clone())
    }

    pub fn descriptor_backups(&self, account: &FullAccountId) -> Vec<DescriptorBackup> {
        self.accounts
            .lock()
            .get(account)
            .map(|s| s.descriptor_backups.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecoveryStatusSource for FakeF8e {
    async fn get_status(
        &self,
        account: &FullAccountId,
    ) -> Result<Option<ServerRecovery>, F8eError> {
        self.faults.check(F8eCall::GetStatus)?;
        Ok(self.pending_recovery(account))
    }

    async fn initiate(
        &self,
        request: InitiateRecoveryRequest,
    ) -> Result<ServerRecovery, F8eError> {
        self.faults.check(F8eCall::Initiate)?;

        let mut accounts = self.accounts.lock();
        let state = accounts.entry(request.full_account_id.clone()).or_default();
        if let Some(proof) = &request.hw_proof {
            check_recovery_proof(state, &request.full_account_id, proof)?;
        }
        if state.pending.is_some() {
            return Err(F8eError::RecoveryAlreadyExists);
        }

        let now = self.clock.now();
        let recovery = ServerRecovery {
            full_account_id: request.full_account_id,
            lost_factor: request.lost_factor,
            delay_start_time: now,
            delay_end_time: now + request.delay_period.as_secs(),
            destination: request.destination,
        };
        state.pending = Some(recovery.clone());
        Ok(recovery)
    }

    async fn cancel(
        &self,
        account: &FullAccountId,
        hw_proof: Option<&HwProofOfPossession>,
    ) -> Result<(), F8eError> {
        self.faults.check(F8eCall::Cancel)?;

        let mut accounts = self.accounts.lock();
        let Some(state) = accounts.get_mut(account) else {
            return Err(F8eError::NoRecoveryExists);
        };
        if let Some(proof) = hw_proof {
            check_recovery_proof(state, account, proof)?;
        }
        match state.pending.take() {
            Some(_) => Ok(()),
            None => Err(F8eError::NoRecoveryExists),
        }
    }
}

/// A proof passed to initiate or cancel must come from the account's current hardware.
fn check_recovery_proof(
    state: &AccountState,
    account: &FullAccountId,
    proof: &HwProofOfPossession,
) -> Result<(), F8eError> {
    let valid = proof.challenge == recovery_challenge(account)
        && state
            .auth_keys
            .is_some_and(|keys| proof.verify(&keys.hardware).is_ok());
    if valid {
        Ok(())
    } else {
        Err(F8eError::Server {
            status: 403,
            message: "invalid hardware proof of possession".into(),
        })
    }
}

#[async_trait]
impl AccountKeyService for FakeF8e {
    async fn rotate_auth_keys(
        &self,
        account: &FullAccountId,
        destination: &DestinationAuthKeys,
        _app_global_auth_key_hw_signature: &HwSignature,
    ) -> Result<(), F8eError> {
        self.faults.check(F8eCall::RotateAuthKeys)?;

        let mut accounts = self.accounts.lock();
        let state = accounts.entry(account.clone()).or_default();
        match &state.pending {
            Some(pending) if &pending.destination == destination => {
                if !pending.is_delay_complete(self.clock.now()) {
                    return Err(F8eError::DelayNotComplete);
                }
                state.pending = None;
                state.auth_keys = Some(*destination);
                Ok(())
            }
            Some(_) => Err(F8eError::RecoveryAlreadyExists),
            None if state.auth_keys.as_ref() == Some(destination) => Ok(()),
            None => Err(F8eError::NoRecoveryExists),
        }
    }

    async fn is_auth_key_active(
        &self,
        account: &FullAccountId,
        app_global: &AppGlobalAuthPublicKey,
    ) -> Result<bool, F8eError> {
        self.faults.check(F8eCall::IsAuthKeyActive)?;
        Ok(self
            .auth_keys(account)
            .map(|keys| &keys.app_global == app_global)
            .unwrap_or(false))
    }

    async fn create_spending_keyset(
        &self,
        account: &FullAccountId,
        _app_key: &AppSpendingPublicKey,
        _hardware_key: &HwSpendingPublicKey,
        network: BitcoinNetwork,
    ) -> Result<F8eSpendingKeyset, F8eError> {
        self.faults.check(F8eCall::CreateSpendingKeyset)?;

        let keyset_id = uuid::Uuid::new_v4().simple().to_string();
        let coin = match network {
            BitcoinNetwork::Bitcoin => 0,
            _ => 1,
        };
        let keyset = F8eSpendingKeyset {
            spending_public_key: format!("[{}/84'/{}'/0']xpubServer/*", &keyset_id[..8], coin),
            keyset_id,
        };
        self.accounts
            .lock()
            .entry(account.clone())
            .or_default()
            .created
            .push(keyset.clone());
        Ok(keyset)
    }

    async fn list_keysets(&self, account: &FullAccountId) -> Result<Vec<SpendingKeyset>, F8eError> {
        self.faults.check(F8eCall::ListKeysets)?;
        Ok(self
            .accounts
            .lock()
            .get(account)
            .map(|s| s.keysets.clone())
            .unwrap_or_default())
    }

    async fn upload_descriptor_backups(
        &self,
        account: &FullAccountId,
        backups: &[DescriptorBackup],
    ) -> Result<(), F8eError> {
        self.faults.check(F8eCall::UploadDescriptorBackups)?;
        self.accounts
            .lock()
            .entry(account.clone())
            .or_default()
            .descriptor_backups = backups.to_vec();
        Ok(())
    }

    async fn activate_spending_keyset(
        &self,
        account: &FullAccountId,
        keyset: &SpendingKeyset,
        hw_proof: &HwProofOfPossession,
    ) -> Result<(), F8eError> {
        self.faults.check(F8eCall::ActivateSpendingKeyset)?;

        let mut accounts = self.accounts.lock();
        let state = accounts.entry(account.clone()).or_default();

        let auth_keys = state.auth_keys.ok_or(F8eError::Server {
            status: 403,
            message: "account has no auth keys".into(),
        })?;
        if hw_proof.challenge != keyset_activation_challenge(account, keyset.keyset_id())
            || hw_proof.verify(&auth_keys.hardware).is_err()
        {
            return Err(F8eError::Server {
                status: 403,
                message: "invalid hardware proof of possession".into(),
            });
        }
        if !state
            .created
            .iter()
            .any(|k| k.keyset_id == keyset.keyset_id())
        {
            return Err(F8eError::Server {
                status: 404,
                message: format!("unknown keyset {}", keyset.keyset_id()),
            });
        }

        if !state.keysets.iter().any(|k| k.keyset_id() == keyset.keyset_id()) {
            state.keysets.push(keyset.clone());
        }
        state.active_keyset_id = Some(keyset.keyset_id().to_string());
        Ok(())
    }
}
