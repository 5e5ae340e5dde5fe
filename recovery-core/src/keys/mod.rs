// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Account and Key Types
//!
//! Identifiers and public key material that flow through a recovery:
//! the destination auth keys being rotated in, the spending keys of the new
//! keyset, and the hardware-sealed session keys used to encrypt backups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::signing::{self, SignatureError, PUBLIC_KEY_LEN, SIGNATURE_LEN};

/// Server-assigned identifier of a full (app + hardware) account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullAccountId(String);

impl FullAccountId {
    pub fn new(id: impl Into<String>) -> Self {
        FullAccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two factors protecting a full account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalFactor {
    App,
    Hardware,
}

impl PhysicalFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicalFactor::App => "app",
            PhysicalFactor::Hardware => "hardware",
        }
    }
}

impl fmt::Display for PhysicalFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! auth_public_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name([u8; PUBLIC_KEY_LEN]);

        impl $name {
            pub fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
                $name(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

auth_public_key!(
    /// App key used to authenticate ordinary requests.
    AppGlobalAuthPublicKey
);
auth_public_key!(
    /// App key used only to authenticate recovery-scoped requests.
    AppRecoveryAuthPublicKey
);
auth_public_key!(
    /// Hardware device auth key.
    HwAuthPublicKey
);

/// The auth key triple a recovery rotates the account to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationAuthKeys {
    pub app_global: AppGlobalAuthPublicKey,
    pub app_recovery: AppRecoveryAuthPublicKey,
    pub hardware: HwAuthPublicKey,
}

/// Hardware signature over the new app global auth key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwSignature(Vec<u8>);

impl HwSignature {
    /// Wraps raw signature bytes, rejecting anything that is not 64 bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }
        Ok(HwSignature(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HwSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HwSignature({})", hex::encode(&self.0))
    }
}

/// Checks that `hardware` signed `app_global`.
pub fn verify_app_global_auth_key_signature(
    hardware: &HwAuthPublicKey,
    app_global: &AppGlobalAuthPublicKey,
    signature: &HwSignature,
) -> Result<(), SignatureError> {
    signing::verify_signature(hardware.as_bytes(), app_global.as_bytes(), signature.as_bytes())
}

/// App spending public key (extended key with origin, descriptor form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppSpendingPublicKey(pub String);

/// Hardware spending public key (extended key with origin, descriptor form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HwSpendingPublicKey(pub String);

/// Server half of a spending keyset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct F8eSpendingKeyset {
    pub keyset_id: String,
    pub spending_public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitcoinNetwork {
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

/// A complete 2-of-3 spending keyset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpendingKeyset {
    pub local_id: String,
    pub network: BitcoinNetwork,
    pub app_key: AppSpendingPublicKey,
    pub hardware_key: HwSpendingPublicKey,
    pub f8e_keyset: F8eSpendingKeyset,
}

impl SpendingKeyset {
    /// Builds a keyset with a fresh local identifier.
    pub fn new(
        network: BitcoinNetwork,
        app_key: AppSpendingPublicKey,
        hardware_key: HwSpendingPublicKey,
        f8e_keyset: F8eSpendingKeyset,
    ) -> Self {
        SpendingKeyset {
            local_id: uuid::Uuid::new_v4().to_string(),
            network,
            app_key,
            hardware_key,
            f8e_keyset,
        }
    }

    pub fn keyset_id(&self) -> &str {
        &self.f8e_keyset.keyset_id
    }

    /// Output descriptor for the keyset's receive chain.
    pub fn descriptor(&self) -> String {
        format!(
            "wsh(sortedmulti(2,{},{},{}))",
            self.app_key.0, self.hardware_key.0, self.f8e_keyset.spending_public_key
        )
    }
}

macro_rules! sealed_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Self {
                $name(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({} bytes)", stringify!($name), self.0.len())
            }
        }
    };
}

sealed_key!(
    /// Cloud storage encryption key, sealed by the hardware device.
    SealedCsek
);
sealed_key!(
    /// Server storage encryption key, sealed by the hardware device.
    SealedSsek
);

/// Both hardware-sealed session keys of a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealedSessionKeys {
    pub csek: SealedCsek,
    pub ssek: SealedSsek,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigningKeyPair;

    #[test]
    fn test_hw_signature_length_is_checked() {
        assert!(HwSignature::new(vec![0u8; 64]).is_ok());
        assert_eq!(
            HwSignature::new(vec![0u8; 63]),
            Err(SignatureError::InvalidLength(63))
        );
    }

    #[test]
    fn test_verify_app_global_auth_key_signature() {
        let hardware = SigningKeyPair::generate().unwrap();
        let app_global = AppGlobalAuthPublicKey::new([3u8; 32]);
        let signature = HwSignature::new(hardware.sign(app_global.as_bytes())).unwrap();

        let hw_key = HwAuthPublicKey::new(hardware.public_key());
        assert!(verify_app_global_auth_key_signature(&hw_key, &app_global, &signature).is_ok());

        let other_app = AppGlobalAuthPublicKey::new([4u8; 32]);
        assert_eq!(
            verify_app_global_auth_key_signature(&hw_key, &other_app, &signature),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn test_keyset_descriptor() {
        let keyset = SpendingKeyset::new(
            BitcoinNetwork::Signet,
            AppSpendingPublicKey("[aa/84'/1'/0']tpubApp/*".into()),
            HwSpendingPublicKey("[bb/84'/1'/0']tpubHw/*".into()),
            F8eSpendingKeyset {
                keyset_id: "keyset-1".into(),
                spending_public_key: "[cc/84'/1'/0']tpubServer/*".into(),
            },
        );

        assert_eq!(keyset.keyset_id(), "keyset-1");
        assert_eq!(
            keyset.descriptor(),
            concat!(
                "wsh(sortedmulti(2,[aa/84'/1'/0']tpubApp/*,",
                "[bb/84'/1'/0']tpubHw/*,[cc/84'/1'/0']tpubServer/*))"
            )
        );
    }

    #[test]
    fn test_debug_output_is_hex() {
        let key = HwAuthPublicKey::new([0xab; 32]);
        assert!(format!("{:?}", key).starts_with("HwAuthPublicKey(abab"));
    }
}
