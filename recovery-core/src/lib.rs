//! Recovery Core Library
//!
//! Delay-and-notify recovery for two-factor (app + hardware) wallets.
//! All cryptographic operations use the audited `ring` crate.

pub mod api;
pub mod backup;
pub mod clock;
pub mod crypto;
pub mod f8e;
mod fault;
pub mod hardware;
pub mod keys;
pub mod recovery;
pub mod storage;
pub mod sweep;

pub use api::{
    ConfigError, RecoveryConfig, RecoveryService, RecoveryServiceBuilder, RecoveryServiceError,
    RecoveryServiceResult, SyncConfig,
};
pub use backup::{
    BackupError, CloudBackupRequest, CloudBackupUploader, DdkBackupService, DescriptorBackup,
    FakeCloudBackup, FakeDdkBackup,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use crypto::{decrypt, encrypt, EncryptionError, SignatureError, SigningKeyPair, SymmetricKey};
pub use f8e::{
    AccountKeyService, F8eCall, F8eError, FakeF8e, InitiateRecoveryRequest, RecoveryStatusSource,
};
pub use hardware::{
    FakeHardware, HardwareCall, HardwareError, HardwareSigner, HwProofOfPossession, HwSession,
};
pub use keys::{
    AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey, AppSpendingPublicKey, BitcoinNetwork,
    DestinationAuthKeys, F8eSpendingKeyset, FullAccountId, HwAuthPublicKey, HwSignature,
    HwSpendingPublicKey, PhysicalFactor, SealedCsek, SealedSessionKeys, SealedSsek,
    SpendingKeyset,
};
pub use recovery::{
    create_pending_key_bundles, reconcile, AppKeyBundle, AppSessionLifecycle, AppSessionState,
    CancelDelayNotifyError, CancellationService, CompletionServices, CompletionStep,
    InitiateRecoveryError, InitiatedRecovery, KeysetProgress, LocalRecoveryAttemptProgress,
    PendingRecoveryAttempt, PersistedRecoveryState, Recovery, RecoveryCheckpoint,
    RecoveryCompletionPipeline, RecoveryInitiator, RecoveryPersistence, RecoveryStepError,
    RecoveryStore, RecoverySyncer, ServerDependentRecovery, ServerIndependentRecovery,
    ServerRecovery, ServerRecoveryState, SessionIdentity, StepFailure, StillRecovering, StoreError,
    SyncError, SyncHandle,
};
pub use storage::{Storage, StorageError};
pub use sweep::{FakeSweep, SweepCall, SweepError, SweepPlan, SweepService};
