// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! Encrypted local storage for recovery progress, the cached server
//! snapshot, and hardware-sealed session keys. Uses SQLite with
//! application-level encryption for sensitive data.

mod error;
pub mod migration;
mod recovery;

pub use error::StorageError;

use rusqlite::Connection;
use std::path::Path;

use crate::crypto::SymmetricKey;

/// SQLite-based storage implementation.
///
/// Local progress and raw session keys are encrypted with `encryption_key`
/// before they reach the database.
pub struct Storage {
    conn: Connection,
    encryption_key: SymmetricKey,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(
        path: P,
        encryption_key: SymmetricKey,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Storage {
            conn,
            encryption_key,
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Creates an in-memory storage (for testing).
    pub fn in_memory(encryption_key: SymmetricKey) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage {
            conn,
            encryption_key,
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        migration::MigrationRunner::run(&self.conn, &migration::all_migrations())
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn)
    }
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
