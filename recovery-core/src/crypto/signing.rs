// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ed25519 signatures.
//!
//! The hardware device signs the new app global auth key with its own auth
//! key. That signature is what lets the server accept an auth key rotation
//! requested by the app alone, so it is checked locally before any progress
//! past initiation is persisted.

use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;

/// Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Ed25519 signature length.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature has invalid length {0}, expected {SIGNATURE_LEN}")]
    InvalidLength(usize),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Key generation failed")]
    KeyGenerationFailed,
}

/// Verifies an Ed25519 signature over `message`.
pub fn verify_signature(
    public_key: &[u8; PUBLIC_KEY_LEN],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SignatureError::InvalidLength(signature.len()));
    }

    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(message, signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Ed25519 signing key pair.
///
/// Real signing keys live on the hardware device; this type backs the
/// in-memory hardware fake and test fixtures.
pub struct SigningKeyPair {
    inner: Ed25519KeyPair,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

impl SigningKeyPair {
    /// Generates a new random key pair.
    pub fn generate() -> Result<Self, SignatureError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| SignatureError::KeyGenerationFailed)?;
        let inner = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| SignatureError::KeyGenerationFailed)?;
        Ok(SigningKeyPair { inner })
    }

    /// Returns the raw public key bytes.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(self.inner.public_key().as_ref());
        out
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.sign(message).as_ref().to_vec()
    }
}
