// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sweep of funds from pre-recovery keysets into the new active keyset.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::fault::FaultPlan;
use crate::keys::{FullAccountId, SpendingKeyset};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    #[error("failed to prepare sweep: {0}")]
    Prepare(String),

    #[error("failed to sign sweep: {0}")]
    Sign(String),

    #[error("failed to broadcast sweep: {0}")]
    Broadcast(String),
}

/// A signed transaction moving all funds off the old keysets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub source_keyset_ids: Vec<String>,
    pub destination_keyset_id: String,
    pub amount_sats: u64,
    pub fee_sats: u64,
    pub signed_transaction: Vec<u8>,
}

#[async_trait]
pub trait SweepService: Send + Sync {
    /// Builds and signs the sweep, or `None` when the old keysets hold nothing.
    async fn prepare_sweep(
        &self,
        account: &FullAccountId,
        sources: &[SpendingKeyset],
        destination: &SpendingKeyset,
    ) -> Result<Option<SweepPlan>, SweepError>;

    /// Returns the transaction id.
    async fn broadcast(&self, plan: &SweepPlan) -> Result<String, SweepError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepCall {
    Prepare,
    Broadcast,
}

/// Sweep service over fixed per-keyset balances.
pub struct FakeSweep {
    balances: Mutex<HashMap<String, u64>>,
    broadcasts: Mutex<Vec<SweepPlan>>,
    fee_sats: u64,
    faults: FaultPlan<SweepCall, SweepError>,
}

impl FakeSweep {
    pub fn new(fee_sats: u64) -> Self {
        FakeSweep {
            balances: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            fee_sats,
            faults: FaultPlan::new(),
        }
    }

    pub fn set_balance(&self, keyset_id: impl Into<String>, sats: u64) {
        self.balances.lock().insert(keyset_id.into(), sats);
    }

    pub fn balance(&self, keyset_id: &str) -> u64 {
        self.balances.lock().get(keyset_id).copied().unwrap_or(0)
    }

    pub fn broadcasts(&self) -> Vec<SweepPlan> {
        self.broadcasts.lock().clone()
    }

    pub fn fail_next(&self, call: SweepCall, error: SweepError) {
        self.faults.fail_next(call, error);
    }

    pub fn calls(&self, call: SweepCall) -> usize {
        self.faults.calls(call)
    }
}

#[async_trait]
impl SweepService for FakeSweep {
    async fn prepare_sweep(
        &self,
        _account: &FullAccountId,
        sources: &[SpendingKeyset],
        destination: &SpendingKeyset,
    ) -> Result<Option<SweepPlan>, SweepError> {
        self.faults.check(SweepCall::Prepare)?;

        let balances = self.balances.lock();
        let funded: Vec<(&str, u64)> = sources
            .iter()
            .map(|k| (k.keyset_id(), balances.get(k.keyset_id()).copied().unwrap_or(0)))
            .filter(|(_, sats)| *sats > 0)
            .collect();
        let total: u64 = funded.iter().map(|(_, sats)| sats).sum();
        if total <= self.fee_sats {
            return Ok(None);
        }

        Ok(Some(SweepPlan {
            source_keyset_ids: funded.iter().map(|(id, _)| id.to_string()).collect(),
            destination_keyset_id: destination.keyset_id().to_string(),
            amount_sats: total - self.fee_sats,
            fee_sats: self.fee_sats,
            signed_transaction: destination.descriptor().into_bytes(),
        }))
    }

    async fn broadcast(&self, plan: &SweepPlan) -> Result<String, SweepError> {
        self.faults.check(SweepCall::Broadcast)?;

        let mut balances = self.balances.lock();
        for id in &plan.source_keyset_ids {
            balances.insert(id.clone(), 0);
        }
        *balances.entry(plan.destination_keyset_id.clone()).or_insert(0) += plan.amount_sats;
        drop(balances);

        self.broadcasts.lock().push(plan.clone());
        Ok(hex::encode(&plan.signed_transaction[..plan.signed_transaction.len().min(16)]))
    }
}
