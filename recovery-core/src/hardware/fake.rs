// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory hardware device.

use async_trait::async_trait;

use crate::crypto::{decrypt, encrypt, SigningKeyPair, SymmetricKey};
use crate::fault::FaultPlan;
use crate::keys::{
    AppGlobalAuthPublicKey, BitcoinNetwork, HwAuthPublicKey, HwSignature, HwSpendingPublicKey,
    SealedCsek, SealedSessionKeys, SealedSsek,
};

use super::{HardwareError, HardwareSigner, HwProofOfPossession, HwSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareCall {
    AuthPublicKey,
    SpendingPublicKey,
    SignAppGlobalAuthKey,
    SignChallenge,
    SealSessionKeys,
}

/// Hardware device backed by a software Ed25519 key and a device-local
/// sealing key.
pub struct FakeHardware {
    auth_key: SigningKeyPair,
    sealing_key: SymmetricKey,
    faults: FaultPlan<HardwareCall, HardwareError>,
}

impl FakeHardware {
    pub fn new() -> Result<Self, HardwareError> {
        let auth_key = SigningKeyPair::generate()
            .map_err(|e| HardwareError::CommandFailed(e.to_string()))?;
        let sealing_key =
            SymmetricKey::generate().map_err(|e| HardwareError::CommandFailed(e.to_string()))?;
        Ok(FakeHardware {
            auth_key,
            sealing_key,
            faults: FaultPlan::new(),
        })
    }

    pub fn auth_key(&self) -> HwAuthPublicKey {
        HwAuthPublicKey::new(self.auth_key.public_key())
    }

    /// Signs synchronously, for building fixtures.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.auth_key.sign(message)
    }

    pub fn fail_next(&self, call: HardwareCall, error: HardwareError) {
        self.faults.fail_next(call, error);
    }

    pub fn calls(&self, call: HardwareCall) -> usize {
        self.faults.calls(call)
    }

    /// Recovers a session key sealed by this device.
    pub fn unseal(&self, sealed: &[u8]) -> Result<SymmetricKey, HardwareError> {
        let raw = decrypt(&self.sealing_key, sealed)
            .map_err(|e| HardwareError::CommandFailed(e.to_string()))?;
        SymmetricKey::from_slice(&raw)
            .ok_or_else(|| HardwareError::CommandFailed("sealed key has wrong length".into()))
    }

    fn seal(&self, key: &SymmetricKey) -> Result<Vec<u8>, HardwareError> {
        encrypt(&self.sealing_key, key.as_bytes())
            .map_err(|e| HardwareError::CommandFailed(e.to_string()))
    }
}

#[async_trait]
impl HardwareSigner for FakeHardware {
    async fn auth_public_key(
        &self,
        _session: &HwSession,
    ) -> Result<HwAuthPublicKey, HardwareError> {
        self.faults.check(HardwareCall::AuthPublicKey)?;
        Ok(self.auth_key())
    }

    async fn spending_public_key(
        &self,
        _session: &HwSession,
        network: BitcoinNetwork,
    ) -> Result<HwSpendingPublicKey, HardwareError> {
        self.faults.check(HardwareCall::SpendingPublicKey)?;
        let coin = match network {
            BitcoinNetwork::Bitcoin => 0,
            _ => 1,
        };
        let fingerprint = hex::encode(&self.auth_key.public_key()[..4]);
        Ok(HwSpendingPublicKey(format!(
            "[{}/84'/{}'/0']xpubHw{}/*",
            fingerprint, coin, fingerprint
        )))
    }

    async fn sign_app_global_auth_key(
        &self,
        _session: &HwSession,
        app_global: &AppGlobalAuthPublicKey,
    ) -> Result<HwSignature, HardwareError> {
        self.faults.check(HardwareCall::SignAppGlobalAuthKey)?;
        HwSignature::new(self.auth_key.sign(app_global.as_bytes()))
            .map_err(|e| HardwareError::CommandFailed(e.to_string()))
    }

    async fn sign_challenge(
        &self,
        _session: &HwSession,
        challenge: &[u8],
    ) -> Result<HwProofOfPossession, HardwareError> {
        self.faults.check(HardwareCall::SignChallenge)?;
        Ok(HwProofOfPossession {
            challenge: challenge.to_vec(),
            signature: self.auth_key.sign(challenge),
        })
    }

    async fn seal_session_keys(
        &self,
        _session: &HwSession,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<SealedSessionKeys, HardwareError> {
        self.faults.check(HardwareCall::SealSessionKeys)?;
        Ok(SealedSessionKeys {
            csek: SealedCsek::new(self.seal(csek)?),
            ssek: SealedSsek::new(self.seal(ssek)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::verify_app_global_auth_key_signature;

    #[tokio::test]
    async fn test_signatures_verify_against_auth_key() {
        let hardware = FakeHardware::new().unwrap();
        let session = HwSession::new();
        let app_global = AppGlobalAuthPublicKey::new([3u8; 32]);

        let signature = hardware
            .sign_app_global_auth_key(&session, &app_global)
            .await
            .unwrap();
        verify_app_global_auth_key_signature(&hardware.auth_key(), &app_global, &signature)
            .unwrap();

        let proof = hardware.sign_challenge(&session, b"challenge").await.unwrap();
        proof.verify(&hardware.auth_key()).unwrap();
    }

    #[tokio::test]
    async fn test_sealed_keys_unseal_on_same_device_only() {
        let hardware = FakeHardware::new().unwrap();
        let other = FakeHardware::new().unwrap();
        let session = HwSession::new();
        let csek = SymmetricKey::generate().unwrap();
        let ssek = SymmetricKey::generate().unwrap();

        let sealed = hardware
            .seal_session_keys(&session, &csek, &ssek)
            .await
            .unwrap();

        assert_eq!(hardware.unseal(sealed.csek.as_bytes()).unwrap(), csek);
        assert!(other.unseal(sealed.ssek.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_is_returned_once() {
        let hardware = FakeHardware::new().unwrap();
        let session = HwSession::new();
        hardware.fail_next(HardwareCall::SignChallenge, HardwareError::SessionLost);

        assert_eq!(
            hardware.sign_challenge(&session, b"x").await.unwrap_err(),
            HardwareError::SessionLost
        );
        assert!(hardware.sign_challenge(&session, b"x").await.is_ok());
        assert_eq!(hardware.calls(HardwareCall::SignChallenge), 2);
    }
}
