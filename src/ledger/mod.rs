// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Visit Ledger
//!
//! Per-principal, append-only sequences of confidential visit records.
//!
//! ## Contract
//!
//! - `append` is atomic per principal and assigns the next index
//!   (`len(previous sequence)`); indices are never reused
//! - no update or delete exists
//! - reads for one principal never observe another principal's records
//! - a batch is accepted only with a proof minted for this ledger's scope and
//!   the appending principal, and each proof is accepted at most once
//!
//! ## Two-Phase Append
//!
//! ```text
//! submit_append ──► PendingAppend   (acknowledged, outcome pending)
//! await_commit  ──► VisitRecorded   (durable, index assigned)
//! ```
//!
//! ## Backends
//!
//! - [`InMemoryLedger`]: process-local, for development and tests
//! - [`RedbLedger`]: embedded ACID database

pub mod database;
pub mod memory;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::coprocessor::{CiphertextHandle, EncryptedInputBatch, ProofVerifier};
use crate::models::{Principal, Scope};

pub use database::{DatabaseError, RedbLedger};
pub use memory::InMemoryLedger;

/// Handles per visit batch: country, then city.
pub const VISIT_BATCH_LEN: usize = 2;

/// One confidential visit, owned by exactly one principal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VisitRecord {
    /// Encrypted country identifier.
    pub country_handle: CiphertextHandle,
    /// Encrypted city identifier.
    pub city_handle: CiphertextHandle,
    /// Unix timestamp (seconds) supplied at submission.
    pub timestamp: u64,
    /// Zero-based position within the principal's partition.
    pub index: u64,
}

/// Acknowledgement that an append was received and awaits commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAppend {
    pub receipt: Uuid,
    pub principal: Principal,
}

/// Notification emitted when an append is durably committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRecorded {
    pub principal: Principal,
    pub index: u64,
    pub timestamp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Input proof rejected for {principal}")]
    ProofRejected { principal: Principal },

    #[error("Input proof was already consumed")]
    ProofReplayed,

    #[error("Malformed input batch: {0}")]
    MalformedBatch(String),

    #[error("Unknown append receipt: {0}")]
    UnknownReceipt(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Read/append operations the protocols depend on.
pub trait VisitLedger: Send + Sync {
    /// Scope input proofs must be bound to.
    fn scope(&self) -> Scope;

    fn submit_append(
        &self,
        principal: Principal,
        batch: EncryptedInputBatch,
        timestamp: u64,
    ) -> impl Future<Output = LedgerResult<PendingAppend>> + Send;

    fn await_commit(
        &self,
        pending: PendingAppend,
    ) -> impl Future<Output = LedgerResult<VisitRecorded>> + Send;

    /// Drop an acknowledged append whose commitment will never be awaited.
    ///
    /// Unknown or already committed receipts are ignored.
    fn abandon(&self, pending: &PendingAppend);

    fn count(&self, principal: Principal) -> impl Future<Output = LedgerResult<u64>> + Send;

    /// Full ordered snapshot of a principal's partition.
    fn visits(
        &self,
        principal: Principal,
    ) -> impl Future<Output = LedgerResult<Vec<VisitRecord>>> + Send;

    fn visit(
        &self,
        principal: Principal,
        index: u64,
    ) -> impl Future<Output = LedgerResult<Option<VisitRecord>>> + Send;

    /// Submit and wait for commitment; returns the assigned index.
    fn append(
        &self,
        principal: Principal,
        batch: EncryptedInputBatch,
        timestamp: u64,
    ) -> impl Future<Output = LedgerResult<u64>> + Send {
        async move {
            let pending = self.submit_append(principal, batch, timestamp).await?;
            self.await_commit(pending).await.map(|recorded| recorded.index)
        }
    }
}

// =============================================================================
// Staging shared by the local backends
// =============================================================================

/// An acknowledged append awaiting commitment.
pub(crate) struct StagedAppend {
    pub principal: Principal,
    pub batch: EncryptedInputBatch,
    pub timestamp: u64,
}

impl StagedAppend {
    pub fn record(&self, index: u64) -> VisitRecord {
        VisitRecord {
            country_handle: self.batch.handles[0],
            city_handle: self.batch.handles[1],
            timestamp: self.timestamp,
            index,
        }
    }

    /// Reject batches whose proof was not minted for `scope` and this principal.
    pub fn verify(&self, verifier: &dyn ProofVerifier, scope: Scope) -> LedgerResult<()> {
        if verifier.verify_input_proof(scope, self.principal, &self.batch) {
            Ok(())
        } else {
            Err(LedgerError::ProofRejected {
                principal: self.principal,
            })
        }
    }
}

#[derive(Default)]
pub(crate) struct StagedAppends {
    inner: Mutex<HashMap<Uuid, StagedAppend>>,
}

impl StagedAppends {
    pub fn stage(
        &self,
        principal: Principal,
        batch: EncryptedInputBatch,
        timestamp: u64,
    ) -> LedgerResult<PendingAppend> {
        if batch.handles.len() != VISIT_BATCH_LEN {
            return Err(LedgerError::MalformedBatch(format!(
                "expected {VISIT_BATCH_LEN} handles, got {}",
                batch.handles.len()
            )));
        }
        if batch.proof.is_empty() {
            return Err(LedgerError::MalformedBatch("missing input proof".to_string()));
        }

        let receipt = Uuid::new_v4();
        let mut staged = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Unavailable("staging lock poisoned".to_string()))?;
        staged.insert(
            receipt,
            StagedAppend {
                principal,
                batch,
                timestamp,
            },
        );

        Ok(PendingAppend { receipt, principal })
    }

    pub fn take(&self, pending: &PendingAppend) -> LedgerResult<StagedAppend> {
        let mut staged = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Unavailable("staging lock poisoned".to_string()))?;
        match staged.remove(&pending.receipt) {
            Some(append) if append.principal == pending.principal => Ok(append),
            Some(append) => {
                // Receipt presented by the wrong principal; keep it for its owner
                staged.insert(pending.receipt, append);
                Err(LedgerError::UnknownReceipt(pending.receipt))
            }
            None => Err(LedgerError::UnknownReceipt(pending.receipt)),
        }
    }

    pub fn abandon(&self, pending: &PendingAppend) -> bool {
        let mut staged = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match staged.get(&pending.receipt) {
            Some(append) if append.principal == pending.principal => {
                staged.remove(&pending.receipt);
                true
            }
            _ => false,
        }
    }

    /// Acknowledged appends not yet committed or abandoned.
    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

// =============================================================================
// Runtime-selected backend
// =============================================================================

/// Ledger backend chosen from configuration.
pub enum LedgerBackend {
    Memory(InMemoryLedger),
    Redb(RedbLedger),
}

impl LedgerBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerBackend::Memory(_) => "memory",
            LedgerBackend::Redb(_) => "redb",
        }
    }
}

impl VisitLedger for LedgerBackend {
    fn scope(&self) -> Scope {
        match self {
            LedgerBackend::Memory(ledger) => ledger.scope(),
            LedgerBackend::Redb(ledger) => ledger.scope(),
        }
    }

    async fn submit_append(
        &self,
        principal: Principal,
        batch: EncryptedInputBatch,
        timestamp: u64,
    ) -> LedgerResult<PendingAppend> {
        match self {
            LedgerBackend::Memory(ledger) => ledger.submit_append(principal, batch, timestamp).await,
            LedgerBackend::Redb(ledger) => ledger.submit_append(principal, batch, timestamp).await,
        }
    }

    async fn await_commit(&self, pending: PendingAppend) -> LedgerResult<VisitRecorded> {
        match self {
            LedgerBackend::Memory(ledger) => ledger.await_commit(pending).await,
            LedgerBackend::Redb(ledger) => ledger.await_commit(pending).await,
        }
    }

    fn abandon(&self, pending: &PendingAppend) {
        match self {
            LedgerBackend::Memory(ledger) => ledger.abandon(pending),
            LedgerBackend::Redb(ledger) => ledger.abandon(pending),
        }
    }

    async fn count(&self, principal: Principal) -> LedgerResult<u64> {
        match self {
            LedgerBackend::Memory(ledger) => ledger.count(principal).await,
            LedgerBackend::Redb(ledger) => ledger.count(principal).await,
        }
    }

    async fn visits(&self, principal: Principal) -> LedgerResult<Vec<VisitRecord>> {
        match self {
            LedgerBackend::Memory(ledger) => ledger.visits(principal).await,
            LedgerBackend::Redb(ledger) => ledger.visits(principal).await,
        }
    }

    async fn visit(&self, principal: Principal, index: u64) -> LedgerResult<Option<VisitRecord>> {
        match self {
            LedgerBackend::Memory(ledger) => ledger.visit(principal, index).await,
            LedgerBackend::Redb(ledger) => ledger.visit(principal, index).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    fn principal() -> Principal {
        Principal(address!("0x1111111111111111111111111111111111111111"))
    }

    fn batch(handles: usize) -> EncryptedInputBatch {
        EncryptedInputBatch {
            handles: (0..handles)
                .map(|i| CiphertextHandle::from([i as u8; 32]))
                .collect(),
            proof: Bytes::from(vec![9u8; 32]),
        }
    }

    #[test]
    fn staging_rejects_wrong_handle_count() {
        let staged = StagedAppends::default();
        let result = staged.stage(principal(), batch(3), 0);
        assert!(matches!(result, Err(LedgerError::MalformedBatch(_))));
    }

    #[test]
    fn staging_rejects_missing_proof() {
        let staged = StagedAppends::default();
        let mut no_proof = batch(2);
        no_proof.proof = Bytes::new();
        let result = staged.stage(principal(), no_proof, 0);
        assert!(matches!(result, Err(LedgerError::MalformedBatch(_))));
    }

    #[test]
    fn abandoned_receipt_is_released() {
        let staged = StagedAppends::default();
        let pending = staged.stage(principal(), batch(2), 42).unwrap();
        let foreign = PendingAppend {
            receipt: pending.receipt,
            principal: Principal(address!("0x2222222222222222222222222222222222222222")),
        };

        assert!(!staged.abandon(&foreign));
        assert_eq!(staged.pending_count(), 1);

        assert!(staged.abandon(&pending));
        assert_eq!(staged.pending_count(), 0);
        assert!(matches!(
            staged.take(&pending),
            Err(LedgerError::UnknownReceipt(_))
        ));
        assert!(!staged.abandon(&pending));
    }

    #[test]
    fn receipts_are_single_use() {
        let staged = StagedAppends::default();
        let pending = staged.stage(principal(), batch(2), 42).unwrap();

        let append = staged.take(&pending).unwrap();
        assert_eq!(append.timestamp, 42);
        assert_eq!(append.record(3).index, 3);

        assert!(matches!(
            staged.take(&pending),
            Err(LedgerError::UnknownReceipt(_))
        ));
    }

    #[test]
    fn receipt_cannot_be_redeemed_by_another_principal() {
        let staged = StagedAppends::default();
        let pending = staged.stage(principal(), batch(2), 42).unwrap();

        let forged = PendingAppend {
            receipt: pending.receipt,
            principal: Principal(address!("0x2222222222222222222222222222222222222222")),
        };
        assert!(staged.take(&forged).is_err());
        assert!(staged.take(&pending).is_ok());
    }
}
