// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Server ("F8e") Interfaces
//!
//! The recovery engine talks to the server through two traits:
//! - [`RecoveryStatusSource`]: pending delay-and-notify recovery status,
//!   initiation and cancellation.
//! - [`AccountKeyService`]: auth key rotation and spending keyset
//!   management used while completing a recovery.
//!
//! Transport, authentication and retry policy live behind these traits.

mod fake;

pub use fake::{F8eCall, FakeF8e};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::backup::DescriptorBackup;
use crate::hardware::HwProofOfPossession;
use crate::keys::{
    AppGlobalAuthPublicKey, AppSpendingPublicKey, BitcoinNetwork, DestinationAuthKeys,
    F8eSpendingKeyset, FullAccountId, HwSignature, HwSpendingPublicKey, PhysicalFactor,
    SpendingKeyset,
};
use crate::recovery::ServerRecovery;

/// Server call errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum F8eError {
    #[error("network error: {0}")]
    Connectivity(String),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("no recovery exists")]
    NoRecoveryExists,

    #[error("a recovery is already pending")]
    RecoveryAlreadyExists,

    #[error("delay period has not ended")]
    DelayNotComplete,

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

/// Parameters for starting a delay-and-notify recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRecoveryRequest {
    pub full_account_id: FullAccountId,
    pub lost_factor: PhysicalFactor,
    pub destination: DestinationAuthKeys,
    /// Required by the server when the app factor is lost.
    pub hw_proof: Option<HwProofOfPossession>,
    pub delay_period: Duration,
}

#[async_trait]
pub trait RecoveryStatusSource: Send + Sync {
    /// Pending recovery for the account, if any.
    async fn get_status(
        &self,
        account: &FullAccountId,
    ) -> Result<Option<ServerRecovery>, F8eError>;

    async fn initiate(&self, request: InitiateRecoveryRequest)
        -> Result<ServerRecovery, F8eError>;

    /// Fails with [`F8eError::NoRecoveryExists`] when nothing is pending.
    async fn cancel(
        &self,
        account: &FullAccountId,
        hw_proof: Option<&HwProofOfPossession>,
    ) -> Result<(), F8eError>;
}

#[async_trait]
pub trait AccountKeyService: Send + Sync {
    /// Completes the pending recovery server-side and makes `destination`
    /// the account's auth keys. Succeeds again if they already are.
    async fn rotate_auth_keys(
        &self,
        account: &FullAccountId,
        destination: &DestinationAuthKeys,
        app_global_auth_key_hw_signature: &HwSignature,
    ) -> Result<(), F8eError>;

    async fn is_auth_key_active(
        &self,
        account: &FullAccountId,
        app_global: &AppGlobalAuthPublicKey,
    ) -> Result<bool, F8eError>;

    async fn create_spending_keyset(
        &self,
        account: &FullAccountId,
        app_key: &AppSpendingPublicKey,
        hardware_key: &HwSpendingPublicKey,
        network: BitcoinNetwork,
    ) -> Result<F8eSpendingKeyset, F8eError>;

    /// All keysets ever activated for the account.
    async fn list_keysets(&self, account: &FullAccountId) -> Result<Vec<SpendingKeyset>, F8eError>;

    async fn upload_descriptor_backups(
        &self,
        account: &FullAccountId,
        backups: &[DescriptorBackup],
    ) -> Result<(), F8eError>;

    async fn activate_spending_keyset(
        &self,
        account: &FullAccountId,
        keyset: &SpendingKeyset,
        hw_proof: &HwProofOfPossession,
    ) -> Result<(), F8eError>;
}

/// Challenge the hardware signs to authorize activating a keyset.
pub fn keyset_activation_challenge(account: &FullAccountId, keyset_id: &str) -> Vec<u8> {
    format!("ActivateSpendingKeyset:{}:{}", account, keyset_id).into_bytes()
}

/// Challenge the hardware signs to authorize initiating or cancelling a recovery.
pub fn recovery_challenge(account: &FullAccountId) -> Vec<u8> {
    format!("DelayNotify:{}", account).into_bytes()
}
