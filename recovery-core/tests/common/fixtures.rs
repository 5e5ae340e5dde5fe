// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test Fixtures
//!
//! Fake wiring for a single account whose hardware was lost, plus a
//! persistence wrapper with switchable write failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recovery_core::{
    AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey, AppSessionLifecycle, AppSpendingPublicKey,
    BitcoinNetwork, CancellationService, CompletionServices, DestinationAuthKeys,
    F8eSpendingKeyset, FakeCloudBackup, FakeDdkBackup, FakeF8e, FakeHardware, FakeSweep,
    FixedClock, FullAccountId, HwAuthPublicKey, HwSignature, HwSpendingPublicKey,
    LocalRecoveryAttemptProgress, PendingRecoveryAttempt, PersistedRecoveryState, PhysicalFactor,
    RecoveryCompletionPipeline, RecoveryConfig, RecoveryInitiator, RecoveryPersistence,
    RecoveryService, RecoveryStore, RecoverySyncer, SealedSessionKeys, ServerRecovery,
    ServerRecoveryState, SessionIdentity, SpendingKeyset, Storage, StorageError, SymmetricKey,
};

pub const ACCOUNT: &str = "urn:wallet-account:000000000000000000000000001";

/// Unix time the fixtures start at.
pub const START: u64 = 1_700_000_000;

pub const DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const OLD_KEYSET_ID: &str = "keyset-original";

pub fn account() -> FullAccountId {
    FullAccountId::new(ACCOUNT)
}

pub fn identity() -> SessionIdentity {
    SessionIdentity::new(account())
}

pub fn storage() -> Storage {
    Storage::in_memory(SymmetricKey::generate().unwrap()).unwrap()
}

/// Destination keys: fresh app keys plus the given hardware key.
pub fn destination(seed: u8, hardware: HwAuthPublicKey) -> DestinationAuthKeys {
    DestinationAuthKeys {
        app_global: AppGlobalAuthPublicKey::new([seed; 32]),
        app_recovery: AppRecoveryAuthPublicKey::new([seed.wrapping_add(1); 32]),
        hardware,
    }
}

/// A hardware-loss attempt whose destination hardware is `hardware`.
pub fn pending_attempt(hardware: &FakeHardware, seed: u8) -> PendingRecoveryAttempt {
    let destination = destination(seed, hardware.auth_key());
    let signature = HwSignature::new(hardware.sign(destination.app_global.as_bytes())).unwrap();
    PendingRecoveryAttempt {
        full_account_id: account(),
        lost_factor: PhysicalFactor::Hardware,
        destination,
        app_spending_key: AppSpendingPublicKey(format!("[{:02x}/84'/0'/0']xpubApp/*", seed)),
        hw_spending_key: HwSpendingPublicKey("[bb/84'/0'/0']xpubHw/*".into()),
        app_global_auth_key_hw_signature: signature,
    }
}

/// Server snapshot matching `attempt`, with the delay window starting at `start`.
pub fn server_recovery(attempt: &PendingRecoveryAttempt, start: u64) -> ServerRecovery {
    ServerRecovery {
        full_account_id: attempt.full_account_id.clone(),
        lost_factor: attempt.lost_factor,
        delay_start_time: start,
        delay_end_time: start + DELAY.as_secs(),
        destination: attempt.destination,
    }
}

pub fn sealed_keys() -> SealedSessionKeys {
    SealedSessionKeys {
        csek: recovery_core::SealedCsek::new(vec![1; 40]),
        ssek: recovery_core::SealedSsek::new(vec![2; 40]),
    }
}

pub fn original_keyset() -> SpendingKeyset {
    SpendingKeyset::new(
        BitcoinNetwork::Bitcoin,
        AppSpendingPublicKey("[aa/84'/0'/0']xpubOldApp/*".into()),
        HwSpendingPublicKey("[cc/84'/0'/0']xpubOldHw/*".into()),
        F8eSpendingKeyset {
            keyset_id: OLD_KEYSET_ID.into(),
            spending_public_key: "[dd/84'/0'/0']xpubOldServer/*".into(),
        },
    )
}

/// All fakes for one account.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub f8e: Arc<FakeF8e>,
    pub hardware: Arc<FakeHardware>,
    pub cloud: Arc<FakeCloudBackup>,
    pub ddk: Arc<FakeDdkBackup>,
    pub sweep: Arc<FakeSweep>,
    pub lifecycle: AppSessionLifecycle,
}

impl Harness {
    /// Account with one funded keyset and auth keys from the lost device.
    pub fn new() -> Self {
        super::init_logging();
        let clock = Arc::new(FixedClock::new(START));
        let f8e = Arc::new(FakeF8e::new(clock.clone()));
        let lost_device = FakeHardware::new().unwrap();
        f8e.set_auth_keys(&account(), destination(1, lost_device.auth_key()));
        f8e.add_keyset(&account(), original_keyset());

        let sweep = Arc::new(FakeSweep::new(1_000));
        sweep.set_balance(OLD_KEYSET_ID, 250_000);

        Harness {
            clock,
            f8e,
            hardware: Arc::new(FakeHardware::new().unwrap()),
            cloud: Arc::new(FakeCloudBackup::new()),
            ddk: Arc::new(FakeDdkBackup::new()),
            sweep,
            lifecycle: AppSessionLifecycle::default(),
        }
    }

    pub fn attempt(&self) -> PendingRecoveryAttempt {
        pending_attempt(&self.hardware, 40)
    }

    pub fn elapse_delay(&self) {
        self.clock.advance(DELAY + Duration::from_secs(1));
    }

    pub fn completion_services(&self) -> CompletionServices {
        CompletionServices {
            keys: self.f8e.clone(),
            hardware: self.hardware.clone(),
            cloud_backup: self.cloud.clone(),
            ddk_backup: self.ddk.clone(),
            sweep: self.sweep.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Store, syncer, pipeline, cancellation and initiation over `persistence`.
    pub fn engine(&self, persistence: Box<dyn RecoveryPersistence>) -> Engine {
        let store = Arc::new(RecoveryStore::new(persistence, identity()).unwrap());
        let syncer = Arc::new(RecoverySyncer::new(
            store.clone(),
            self.f8e.clone(),
            self.lifecycle.clone(),
        ));
        let pipeline = RecoveryCompletionPipeline::new(
            store.clone(),
            syncer.clone(),
            self.completion_services(),
            BitcoinNetwork::Bitcoin,
        );
        Engine {
            cancellation: CancellationService::new(store.clone(), self.f8e.clone()),
            initiator: RecoveryInitiator::new(store.clone(), self.f8e.clone()),
            store,
            syncer,
            pipeline,
        }
    }

    pub fn service(&self, config: RecoveryConfig) -> RecoveryService {
        RecoveryService::builder(account(), config)
            .status_source(self.f8e.clone())
            .key_service(self.f8e.clone())
            .hardware(self.hardware.clone())
            .cloud_backup(self.cloud.clone())
            .ddk_backup(self.ddk.clone())
            .sweep(self.sweep.clone())
            .clock(self.clock.clone())
            .lifecycle(self.lifecycle.clone())
            .build()
            .unwrap()
    }
}

pub struct Engine {
    pub store: Arc<RecoveryStore>,
    pub syncer: Arc<RecoverySyncer>,
    pub pipeline: RecoveryCompletionPipeline,
    pub cancellation: CancellationService,
    pub initiator: RecoveryInitiator,
}

/// Storage whose writes can be made to fail on demand.
pub struct FlakyPersistence {
    inner: Storage,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyPersistence {
    pub fn new(inner: Storage) -> (Self, Arc<AtomicBool>) {
        let fail_writes = Arc::new(AtomicBool::new(false));
        (
            FlakyPersistence {
                inner,
                fail_writes: fail_writes.clone(),
            },
            fail_writes,
        )
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".into()),
            )));
        }
        Ok(())
    }
}

impl RecoveryPersistence for FlakyPersistence {
    fn load(&self) -> Result<PersistedRecoveryState, StorageError> {
        self.inner.load_recovery_state()
    }

    fn save_local_progress(
        &self,
        progress: &LocalRecoveryAttemptProgress,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_local_progress(progress)
    }

    fn save_server_recovery(&self, state: &ServerRecoveryState) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_server_recovery(state)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.check()?;
        self.inner.clear_recovery_state()
    }

    fn save_session_keys(
        &self,
        sealed: &SealedSessionKeys,
        csek: &SymmetricKey,
        ssek: &SymmetricKey,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.inner.save_session_keys(sealed, csek, ssek)
    }

    fn load_session_key(&self, sealed: &[u8]) -> Result<Option<SymmetricKey>, StorageError> {
        self.inner.load_session_key(sealed)
    }
}
