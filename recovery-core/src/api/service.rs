// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Recovery Service
//!
//! Main entry point for hosts. Wires storage, store, syncer, completion
//! pipeline, cancellation and initiation for one signed-in account.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::backup::{CloudBackupUploader, DdkBackupService};
use crate::clock::{Clock, SystemClock};
use crate::crypto::SymmetricKey;
use crate::f8e::{AccountKeyService, RecoveryStatusSource};
use crate::hardware::{HardwareSigner, HwProofOfPossession, HwSession};
use crate::keys::FullAccountId;
use crate::recovery::{
    AppSessionLifecycle, CancellationService, CompletionServices, CompletionStep,
    PendingRecoveryAttempt, Recovery, RecoveryCompletionPipeline, RecoveryInitiator,
    RecoveryPersistence, RecoveryStore, RecoverySyncer, ServerRecovery, SessionIdentity,
    SyncHandle,
};
use crate::storage::{Storage, StorageError};
use crate::sweep::SweepService;

use super::config::RecoveryConfig;
use super::error::{RecoveryServiceError, RecoveryServiceResult};

/// Delay-and-notify recovery for one account.
///
/// # Example
///
/// ```ignore
/// use recovery_core::api::{RecoveryConfig, RecoveryService};
///
/// let service = RecoveryService::builder(account_id, RecoveryConfig::default())
///     .status_source(f8e.clone())
///     .key_service(f8e)
///     .hardware(hardware)
///     .cloud_backup(cloud)
///     .ddk_backup(ddk)
///     .sweep(sweep)
///     .build()?;
///
/// service.initiate_recovery(attempt, None).await?;
/// // ... delay period passes ...
/// service.complete_recovery(Some(&hw_session)).await?;
/// ```
pub struct RecoveryService {
    config: RecoveryConfig,
    store: Arc<RecoveryStore>,
    syncer: Arc<RecoverySyncer>,
    pipeline: RecoveryCompletionPipeline,
    cancellation: CancellationService,
    initiator: RecoveryInitiator,
    lifecycle: AppSessionLifecycle,
    sync_handle: Mutex<Option<SyncHandle>>,
}

impl RecoveryService {
    pub fn builder(account: FullAccountId, config: RecoveryConfig) -> RecoveryServiceBuilder {
        RecoveryServiceBuilder::new(account, config)
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn account(&self) -> &FullAccountId {
        &self.store.identity().full_account_id
    }

    pub fn lifecycle(&self) -> &AppSessionLifecycle {
        &self.lifecycle
    }

    // === State ===

    /// Stream of rendered recovery states, current value first.
    pub fn active_recovery(&self) -> WatchStream<Recovery> {
        self.store.active_recovery()
    }

    pub fn current_recovery(&self) -> Recovery {
        self.store.current()
    }

    /// The step the next advance would run, if a recovery is in progress.
    pub fn next_step(&self) -> Option<CompletionStep> {
        self.pipeline.next_step()
    }

    // === Sync ===

    /// Starts background polling. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sync(&self) {
        let mut handle = self.sync_handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *handle = Some(
            self.syncer
                .launch_sync(self.account().clone(), self.config.sync.sync_frequency),
        );
    }

    pub async fn stop_sync(&self) {
        let handle = self.sync_handle.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Polls the server once.
    pub async fn sync_now(&self) -> RecoveryServiceResult<Recovery> {
        self.syncer.perform_sync(self.account()).await?;
        Ok(self.store.current())
    }

    // === Recovery operations ===

    /// Initiates a recovery with the configured delay period.
    pub async fn initiate_recovery(
        &self,
        attempt: PendingRecoveryAttempt,
        hw_proof: Option<HwProofOfPossession>,
    ) -> RecoveryServiceResult<ServerRecovery> {
        Ok(self
            .initiator
            .initiate(attempt, hw_proof, self.config.delay_period)
            .await?)
    }

    pub async fn cancel_recovery(
        &self,
        hw_proof: Option<&HwProofOfPossession>,
    ) -> RecoveryServiceResult<()> {
        self.cancellation
            .cancel_recovery(self.account(), hw_proof)
            .await?;
        Ok(())
    }

    /// Runs one completion step.
    pub async fn advance_recovery(
        &self,
        hw_session: Option<&HwSession>,
    ) -> RecoveryServiceResult<Recovery> {
        Ok(self.pipeline.advance(hw_session).await?)
    }

    /// Re-runs the step that last failed.
    pub async fn retry_recovery(
        &self,
        hw_session: Option<&HwSession>,
    ) -> RecoveryServiceResult<Recovery> {
        Ok(self.pipeline.retry(hw_session).await?)
    }

    /// Runs every remaining step.
    pub async fn complete_recovery(
        &self,
        hw_session: Option<&HwSession>,
    ) -> RecoveryServiceResult<()> {
        self.pipeline.complete(hw_session).await?;
        Ok(())
    }

    pub async fn recheck_recovery_status(&self) -> RecoveryServiceResult<Recovery> {
        Ok(self.pipeline.recheck_recovery_status().await?)
    }

    pub async fn acknowledge_no_longer_recovering(&self) -> RecoveryServiceResult<()> {
        self.pipeline.acknowledge_no_longer_recovering().await?;
        Ok(())
    }
}

/// Builder for [`RecoveryService`].
pub struct RecoveryServiceBuilder {
    account: FullAccountId,
    config: RecoveryConfig,
    storage_key: Option<SymmetricKey>,
    persistence: Option<Box<dyn RecoveryPersistence>>,
    status_source: Option<Arc<dyn RecoveryStatusSource>>,
    key_service: Option<Arc<dyn AccountKeyService>>,
    hardware: Option<Arc<dyn HardwareSigner>>,
    cloud_backup: Option<Arc<dyn CloudBackupUploader>>,
    ddk_backup: Option<Arc<dyn DdkBackupService>>,
    sweep: Option<Arc<dyn SweepService>>,
    clock: Option<Arc<dyn Clock>>,
    lifecycle: Option<AppSessionLifecycle>,
}

impl RecoveryServiceBuilder {
    pub fn new(account: FullAccountId, config: RecoveryConfig) -> Self {
        RecoveryServiceBuilder {
            account,
            config,
            storage_key: None,
            persistence: None,
            status_source: None,
            key_service: None,
            hardware: None,
            cloud_backup: None,
            ddk_backup: None,
            sweep: None,
            clock: None,
            lifecycle: None,
        }
    }

    /// Key encrypting the database. Required with an on-disk storage path.
    pub fn storage_key(mut self, key: SymmetricKey) -> Self {
        self.storage_key = Some(key);
        self
    }

    /// Replaces SQLite storage with a custom backend.
    pub fn persistence(mut self, persistence: Box<dyn RecoveryPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn status_source(mut self, source: Arc<dyn RecoveryStatusSource>) -> Self {
        self.status_source = Some(source);
        self
    }

    pub fn key_service(mut self, keys: Arc<dyn AccountKeyService>) -> Self {
        self.key_service = Some(keys);
        self
    }

    pub fn hardware(mut self, hardware: Arc<dyn HardwareSigner>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn cloud_backup(mut self, cloud_backup: Arc<dyn CloudBackupUploader>) -> Self {
        self.cloud_backup = Some(cloud_backup);
        self
    }

    pub fn ddk_backup(mut self, ddk_backup: Arc<dyn DdkBackupService>) -> Self {
        self.ddk_backup = Some(ddk_backup);
        self
    }

    pub fn sweep(mut self, sweep: Arc<dyn SweepService>) -> Self {
        self.sweep = Some(sweep);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a lifecycle starting in the foreground.
    pub fn lifecycle(mut self, lifecycle: AppSessionLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Builds the service. Starts polling when auto-sync is on and a tokio
    /// runtime is available.
    pub fn build(self) -> RecoveryServiceResult<RecoveryService> {
        self.config.validate()?;

        let persistence = match self.persistence {
            Some(persistence) => persistence,
            None => Box::new(open_storage(&self.config, self.storage_key)?),
        };
        let status_source = required(self.status_source, "recovery status source")?;
        let services = CompletionServices {
            keys: required(self.key_service, "account key service")?,
            hardware: required(self.hardware, "hardware signer")?,
            cloud_backup: required(self.cloud_backup, "cloud backup uploader")?,
            ddk_backup: required(self.ddk_backup, "DDK backup service")?,
            sweep: required(self.sweep, "sweep service")?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        let lifecycle = self.lifecycle.unwrap_or_default();

        let store = Arc::new(RecoveryStore::new(
            persistence,
            SessionIdentity::new(self.account),
        )?);
        let syncer = Arc::new(RecoverySyncer::new(
            Arc::clone(&store),
            Arc::clone(&status_source),
            lifecycle.clone(),
        ));
        let pipeline = RecoveryCompletionPipeline::new(
            Arc::clone(&store),
            Arc::clone(&syncer),
            services,
            self.config.network,
        );
        let cancellation = CancellationService::new(Arc::clone(&store), Arc::clone(&status_source));
        let initiator = RecoveryInitiator::new(Arc::clone(&store), status_source);

        let service = RecoveryService {
            config: self.config,
            store,
            syncer,
            pipeline,
            cancellation,
            initiator,
            lifecycle,
            sync_handle: Mutex::new(None),
        };

        if service.config.sync.auto_sync && tokio::runtime::Handle::try_current().is_ok() {
            service.start_sync();
        }
        info!(account = %service.account(), "Recovery service ready");
        Ok(service)
    }
}

fn required<T: ?Sized>(
    collaborator: Option<Arc<T>>,
    name: &'static str,
) -> RecoveryServiceResult<Arc<T>> {
    collaborator.ok_or(RecoveryServiceError::MissingCollaborator(name))
}

fn open_storage(
    config: &RecoveryConfig,
    storage_key: Option<SymmetricKey>,
) -> RecoveryServiceResult<Storage> {
    match &config.storage_path {
        Some(path) => {
            let key = storage_key.ok_or(RecoveryServiceError::MissingCollaborator("storage key"))?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RecoveryServiceError::Io(e.to_string()))?;
            }
            debug!(path = %path.display(), "Opening recovery database");
            Ok(Storage::open(path, key)?)
        }
        None => {
            let key = match storage_key {
                Some(key) => key,
                None => SymmetricKey::generate().map_err(StorageError::from)?,
            };
            Ok(Storage::in_memory(key)?)
        }
    }
}
