// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local ledger backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    LedgerError, LedgerResult, PendingAppend, StagedAppends, VisitLedger, VisitRecord,
    VisitRecorded,
};
use crate::coprocessor::{EncryptedInputBatch, ProofVerifier};
use crate::models::{Principal, Scope};

#[derive(Default)]
struct Partitions {
    visits: HashMap<Principal, Vec<VisitRecord>>,
    consumed_proofs: HashSet<Bytes>,
}

/// Ledger held entirely in memory; lost on restart.
pub struct InMemoryLedger {
    scope: Scope,
    verifier: Arc<dyn ProofVerifier>,
    staged: StagedAppends,
    partitions: RwLock<Partitions>,
}

impl InMemoryLedger {
    pub fn new(scope: Scope, verifier: Arc<dyn ProofVerifier>) -> Self {
        Self {
            scope,
            verifier,
            staged: StagedAppends::default(),
            partitions: RwLock::new(Partitions::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.staged.pending_count()
    }
}

impl VisitLedger for InMemoryLedger {
    fn scope(&self) -> Scope {
        self.scope
    }

    async fn submit_append(
        &self,
        principal: Principal,
        batch: EncryptedInputBatch,
        timestamp: u64,
    ) -> LedgerResult<PendingAppend> {
        self.staged.stage(principal, batch, timestamp)
    }

    async fn await_commit(&self, pending: PendingAppend) -> LedgerResult<VisitRecorded> {
        let staged = self.staged.take(&pending)?;
        staged.verify(self.verifier.as_ref(), self.scope)?;

        // Single write lock: replay check, index assignment and push are atomic
        let mut partitions = self.partitions.write().await;
        if partitions.consumed_proofs.contains(&staged.batch.proof) {
            return Err(LedgerError::ProofReplayed);
        }

        let sequence = partitions.visits.entry(staged.principal).or_default();
        let index = sequence.len() as u64;
        sequence.push(staged.record(index));
        partitions.consumed_proofs.insert(staged.batch.proof.clone());

        info!(
            principal = %staged.principal,
            index,
            timestamp = staged.timestamp,
            "Visit recorded"
        );

        Ok(VisitRecorded {
            principal: staged.principal,
            index,
            timestamp: staged.timestamp,
        })
    }

    fn abandon(&self, pending: &PendingAppend) {
        if self.staged.abandon(pending) {
            debug!(principal = %pending.principal, receipt = %pending.receipt, "Staged append abandoned");
        }
    }

    async fn count(&self, principal: Principal) -> LedgerResult<u64> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .visits
            .get(&principal)
            .map_or(0, |sequence| sequence.len() as u64))
    }

    async fn visits(&self, principal: Principal) -> LedgerResult<Vec<VisitRecord>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .visits
            .get(&principal)
            .cloned()
            .unwrap_or_default())
    }

    async fn visit(&self, principal: Principal, index: u64) -> LedgerResult<Option<VisitRecord>> {
        let partitions = self.partitions.read().await;
        let Ok(position) = usize::try_from(index) else {
            return Ok(None);
        };
        Ok(partitions
            .visits
            .get(&principal)
            .and_then(|sequence| sequence.get(position))
            .copied())
    }
}
