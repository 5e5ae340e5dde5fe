// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hardware Signer Interface
//!
//! Operations that need a tap of the hardware device. Every call takes an
//! [`HwSession`], the handle of a live NFC session; callers without one
//! cannot run hardware steps.

mod fake;

pub use fake::{FakeHardware, HardwareCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{verify_signature, SignatureError, SymmetricKey};
use crate::keys::{
    AppGlobalAuthPublicKey, BitcoinNetwork, HwAuthPublicKey, HwSignature, HwSpendingPublicKey,
    SealedSessionKeys,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("NFC session was lost")]
    SessionLost,

    #[error("hardware device is locked")]
    Locked,

    #[error("hardware command failed: {0}")]
    CommandFailed(String),
}

/// Handle of a live NFC session with the hardware device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwSession {
    id: String,
}

impl HwSession {
    pub fn new() -> Self {
        HwSession {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for HwSession {
    fn default() -> Self {
        HwSession::new()
    }
}

/// Hardware signature over a server-issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwProofOfPossession {
    pub challenge: Vec<u8>,
    pub signature: Vec<u8>,
}

impl HwProofOfPossession {
    pub fn verify(&self, key: &HwAuthPublicKey) -> Result<(), SignatureError> {
        verify_signature(key.as_bytes(), &self.challenge, &self.signature)
    }
}

#[async_trait]
pub trait HardwareSigner: Send + Sync {
    async fn auth_public_key(&self, session: &HwSession) -> Result<HwAuthPublicKey, HardwareError>;

    async fn spending_public_key(
        &self,
        session: &HwSession,
        network: BitcoinNetwork,
    ) -> Result<HwSpendingPublicKey, HardwareError>;

    async fn sign_app_global_auth_key(
        &self,
        session: &HwSession,
        app_global: &AppGlobalAuthPublicKey,
    ) -> Result<HwSignature, HardwareError>;

    async fn sign_challenge(
        &self,
        session: &HwSession,
        challenge: &[u8],
    ) -> Result<HwProofOfPossession, HardwareError>;

    /// Seals the session keys so only this device can unseal them.
    async fn seal_session_keys(
        &self,
        session: &HwSession,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<SealedSessionKeys, HardwareError>;
}
