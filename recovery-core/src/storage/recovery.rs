// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery storage operations.
//!
//! Every write runs in its own transaction so a reader never sees local
//! progress and server snapshot from different writes.

use rusqlite::{params, OptionalExtension};

use crate::crypto::{decrypt, encrypt, SymmetricKey};
use crate::keys::SealedSessionKeys;
use crate::recovery::{
    LocalRecoveryAttemptProgress, PersistedRecoveryState, RecoveryPersistence, ServerRecovery,
    ServerRecoveryState,
};

use super::{unix_now, Storage, StorageError};

impl Storage {
    // === Recovery State Operations ===

    /// Loads local progress and server snapshot in a single read.
    pub fn load_recovery_state(&self) -> Result<PersistedRecoveryState, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT local_progress, server_status, server_recovery
                 FROM recovery_state
                 WHERE id = 1",
                [],
                |row| {
                    let local: Option<Vec<u8>> = row.get(0)?;
                    let status: String = row.get(1)?;
                    let server: Option<String> = row.get(2)?;
                    Ok((local, status, server))
                },
            )
            .optional()?;

        let Some((local, status, server)) = row else {
            return Ok(PersistedRecoveryState::default());
        };

        let local = match local {
            Some(ciphertext) => {
                let plaintext = decrypt(&self.encryption_key, &ciphertext)?;
                Some(serde_json::from_slice::<LocalRecoveryAttemptProgress>(
                    &plaintext,
                )?)
            }
            None => None,
        };

        let server = match (status.as_str(), server) {
            ("present", Some(json)) => {
                ServerRecoveryState::Present(serde_json::from_str::<ServerRecovery>(&json)?)
            }
            ("absent", _) => ServerRecoveryState::Absent,
            ("confirmed_absent", _) => ServerRecoveryState::ConfirmedAbsent,
            (other, _) => {
                return Err(StorageError::Corrupted(format!(
                    "unexpected server_status '{}'",
                    other
                )))
            }
        };

        Ok(PersistedRecoveryState { local, server })
    }

    /// Overwrites the local progress row.
    pub fn save_local_progress(
        &self,
        progress: &LocalRecoveryAttemptProgress,
    ) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(progress)?;
        let ciphertext = encrypt(&self.encryption_key, &plaintext)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recovery_state (id, local_progress, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                local_progress = excluded.local_progress,
                updated_at = excluded.updated_at",
            params![ciphertext, unix_now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Overwrites the cached server snapshot.
    pub fn save_server_recovery(&self, state: &ServerRecoveryState) -> Result<(), StorageError> {
        let json = state.snapshot().map(serde_json::to_string).transpose()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recovery_state (id, server_status, server_recovery, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                server_status = excluded.server_status,
                server_recovery = excluded.server_recovery,
                updated_at = excluded.updated_at",
            params![state.as_str(), json, unix_now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Removes local progress, the cached snapshot and all session keys.
    pub fn clear_recovery_state(&self) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM recovery_state", [])?;
        tx.execute("DELETE FROM session_keys", [])?;
        tx.commit()?;
        Ok(())
    }

    // === Session Key Operations ===

    /// Stores the raw CSEK and SSEK under their sealed forms.
    pub fn save_session_keys(
        &self,
        sealed: &SealedSessionKeys,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<(), StorageError> {
        let encrypted_csek = encrypt(&self.encryption_key, csek.as_bytes())?;
        let encrypted_ssek = encrypt(&self.encryption_key, ssek.as_bytes())?;
        let now = unix_now();

        let tx = self.conn.unchecked_transaction()?;
        for (sealed_key, encrypted) in [
            (sealed.csek.as_bytes(), encrypted_csek),
            (sealed.ssek.as_bytes(), encrypted_ssek),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO session_keys (sealed_key, encrypted_key, created_at)
                 VALUES (?1, ?2, ?3)",
                params![sealed_key, encrypted, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Looks up the raw key for a sealed session key.
    pub fn load_session_key(&self, sealed: &[u8]) -> Result<Option<SymmetricKey>, StorageError> {
        let encrypted: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT encrypted_key FROM session_keys WHERE sealed_key = ?1",
                params![sealed],
                |row| row.get(0),
            )
            .optional()?;

        match encrypted {
            Some(ciphertext) => {
                let raw = decrypt(&self.encryption_key, &ciphertext)?;
                SymmetricKey::from_slice(&raw)
                    .map(Some)
                    .ok_or_else(|| StorageError::Corrupted("session key length".into()))
            }
            None => Ok(None),
        }
    }
}

impl RecoveryPersistence for Storage {
    fn load(&self) -> Result<PersistedRecoveryState, StorageError> {
        self.load_recovery_state()
    }

    fn save_local_progress(
        &self,
        progress: &LocalRecoveryAttemptProgress,
    ) -> Result<(), StorageError> {
        Storage::save_local_progress(self, progress)
    }

    fn save_server_recovery(&self, state: &ServerRecoveryState) -> Result<(), StorageError> {
        Storage::save_server_recovery(self, state)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.clear_recovery_state()
    }

    fn save_session_keys(
        &self,
        sealed: &SealedSessionKeys,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<(), StorageError> {
        Storage::save_session_keys(self, sealed, csek, ssek)
    }

    fn load_session_key(&self, sealed: &[u8]) -> Result<Option<SymmetricKey>, StorageError> {
        Storage::load_session_key(self, sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SealedCsek, SealedSsek};

    fn test_storage() -> Storage {
        Storage::in_memory(SymmetricKey::generate().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_state() {
        let storage = test_storage();
        let state = storage.load_recovery_state().unwrap();
        assert!(state.local.is_none());
        assert_eq!(state.server, ServerRecoveryState::Absent);
    }

    #[test]
    fn test_server_status_roundtrip() {
        let storage = test_storage();
        storage
            .save_server_recovery(&ServerRecoveryState::ConfirmedAbsent)
            .unwrap();
        assert_eq!(
            storage.load_recovery_state().unwrap().server,
            ServerRecoveryState::ConfirmedAbsent
        );
    }

    #[test]
    fn test_clear_on_empty_database() {
        let storage = test_storage();
        storage.clear_recovery_state().unwrap();
        storage.clear_recovery_state().unwrap();
        assert!(storage.load_recovery_state().unwrap().local.is_none());
    }

    #[test]
    fn test_session_keys_are_stored_encrypted_and_purged() {
        let storage = test_storage();
        let sealed = SealedSessionKeys {
            csek: SealedCsek::new(vec![1, 2, 3]),
            ssek: SealedSsek::new(vec![4, 5, 6]),
        };
        let csek = SymmetricKey::from_bytes([9u8; 32]);
        let ssek = SymmetricKey::from_bytes([8u8; 32]);

        storage.save_session_keys(&sealed, &csek, &ssek).unwrap();

        let stored: Vec<u8> = storage
            .conn
            .query_row(
                "SELECT encrypted_key FROM session_keys WHERE sealed_key = ?1",
                params![sealed.csek.as_bytes()],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(&stored[..], csek.as_bytes());

        assert_eq!(
            storage.load_session_key(sealed.ssek.as_bytes()).unwrap(),
            Some(ssek)
        );

        storage.clear_recovery_state().unwrap();
        assert_eq!(storage.load_session_key(sealed.csek.as_bytes()).unwrap(), None);
    }
}
