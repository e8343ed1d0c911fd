// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded visit ledger backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `visits`: composite key (principal|index_be) → serialized VisitRecord
//! - `visit_counts`: principal → partition length
//! - `consumed_proofs`: sha256(proof) → timestamp of the consuming append
//! - `ledger_meta`: key → value (registry scope)
//!
//! Each commit writes all three data tables in one write transaction, so the
//! index assignment, the record and the proof consumption are all-or-nothing.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{
    LedgerError, LedgerResult, PendingAppend, StagedAppend, StagedAppends, VisitLedger,
    VisitRecord, VisitRecorded,
};
use crate::coprocessor::{EncryptedInputBatch, ProofVerifier};
use crate::models::{Principal, Scope};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: composite key → VisitRecord (JSON bytes).
/// Key format: `principal_bytes | index_be` so a range scan yields index order.
const VISITS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("visits");

/// Partition length per principal.
const VISIT_COUNTS: TableDefinition<&[u8], u64> = TableDefinition::new("visit_counts");

/// Digests of every proof already consumed by a committed append.
const CONSUMED_PROOFS: TableDefinition<&[u8], u64> = TableDefinition::new("consumed_proofs");

const LEDGER_META: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger_meta");

const SCOPE_KEY: &str = "scope";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("ledger was created for scope {stored}, not {requested}")]
    ScopeMismatch { stored: String, requested: Scope },
}

// Lets `?` on redb calls flow straight into ledger results
macro_rules! impl_from_redb {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for LedgerError {
                fn from(err: $source) -> Self {
                    LedgerError::Database(err.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
);

// =============================================================================
// Key Helpers
// =============================================================================

/// `principal | index_be`
fn visit_key(principal: Principal, index: u64) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..20].copy_from_slice(principal.as_bytes());
    key[20..].copy_from_slice(&index.to_be_bytes());
    key
}

fn proof_key(batch: &EncryptedInputBatch) -> [u8; 32] {
    Sha256::digest(&batch.proof).into()
}

// =============================================================================
// RedbLedger
// =============================================================================

/// Durable ledger stored in a single redb file.
pub struct RedbLedger {
    db: Arc<Database>,
    scope: Scope,
    verifier: Arc<dyn ProofVerifier>,
    staged: StagedAppends,
}

impl RedbLedger {
    /// Open (or create) the ledger at `path` for `scope`.
    ///
    /// A file created for a different scope is refused.
    pub fn open(
        path: &Path,
        scope: Scope,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(VISITS)?;
            let _ = write_txn.open_table(VISIT_COUNTS)?;
            let _ = write_txn.open_table(CONSUMED_PROOFS)?;

            let mut meta = write_txn.open_table(LEDGER_META)?;
            let stored = meta.get(SCOPE_KEY)?.map(|v| v.value().to_vec());
            match stored {
                Some(bytes) if bytes.as_slice() != scope.as_bytes() => {
                    return Err(DatabaseError::ScopeMismatch {
                        stored: alloy::hex::encode_prefixed(&bytes),
                        requested: scope,
                    });
                }
                Some(_) => {}
                None => {
                    meta.insert(SCOPE_KEY, scope.as_bytes())?;
                }
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            scope,
            verifier,
            staged: StagedAppends::default(),
        })
    }

    fn commit(&self, staged: &StagedAppend) -> LedgerResult<u64> {
        let principal_key = staged.principal.as_bytes();
        let proof_key = proof_key(&staged.batch);

        let write_txn = self.db.begin_write()?;
        let index = {
            let mut proofs = write_txn.open_table(CONSUMED_PROOFS)?;
            if proofs.get(proof_key.as_slice())?.is_some() {
                // Dropping the transaction aborts it
                return Err(LedgerError::ProofReplayed);
            }

            let mut counts = write_txn.open_table(VISIT_COUNTS)?;
            let index = counts.get(principal_key)?.map(|v| v.value()).unwrap_or(0);

            let json = serde_json::to_vec(&staged.record(index))?;
            let mut visits = write_txn.open_table(VISITS)?;
            visits.insert(visit_key(staged.principal, index).as_slice(), json.as_slice())?;
            counts.insert(principal_key, index + 1)?;
            proofs.insert(proof_key.as_slice(), staged.timestamp)?;
            index
        };
        write_txn.commit()?;
        Ok(index)
    }
}

impl VisitLedger for RedbLedger {
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

        let index = self.commit(&staged)?;
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
        let read_txn = self.db.begin_read()?;
        let counts = read_txn.open_table(VISIT_COUNTS)?;
        let count = counts
            .get(principal.as_bytes())?
            .map(|v| v.value())
            .unwrap_or(0);
        Ok(count)
    }

    async fn visits(&self, principal: Principal) -> LedgerResult<Vec<VisitRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VISITS)?;

        let start = visit_key(principal, 0);
        let end = visit_key(principal, u64::MAX);

        let mut records = Vec::new();
        for entry in table.range(start.as_slice()..=end.as_slice())? {
            let (_, value) = entry?;
            let record: VisitRecord = serde_json::from_slice(value.value())?;
            records.push(record);
        }
        Ok(records)
    }

    async fn visit(&self, principal: Principal, index: u64) -> LedgerResult<Option<VisitRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VISITS)?;
        match table.get(visit_key(principal, index).as_slice())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coprocessor::{ComputationClient, DecryptionDomain, LocalCoprocessor};
    use alloy::primitives::address;

    fn scope() -> Scope {
        Scope(address!("0x749b19f59b2264f846cff9d68bdb098ce63e31ad"))
    }

    fn alice() -> Principal {
        Principal(address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"))
    }

    fn bob() -> Principal {
        Principal(address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"))
    }

    fn coprocessor() -> LocalCoprocessor {
        LocalCoprocessor::new(
            [6u8; 32],
            DecryptionDomain {
                chain_id: 31_337,
                verifying_contract: address!("0x0000000000000000000000000000000000000d00"),
            },
        )
    }

    fn temp_ledger() -> (LocalCoprocessor, RedbLedger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let coprocessor = coprocessor();
        let ledger = RedbLedger::open(
            &dir.path().join("ledger.redb"),
            scope(),
            Arc::new(coprocessor.clone()),
        )
        .unwrap();
        (coprocessor, ledger, dir)
    }

    #[test]
    fn visit_keys_sort_by_index_within_a_principal() {
        let low = visit_key(alice(), 1);
        let high = visit_key(alice(), 256);
        assert!(low < high);
        assert_eq!(&low[..20], alice().as_bytes());
    }

    #[tokio::test]
    async fn abandoned_append_never_commits() {
        let (coprocessor, ledger, _dir) = temp_ledger();
        let batch = coprocessor.encrypt(scope(), alice(), vec![7, 21]).await.unwrap();
        let pending = ledger.submit_append(alice(), batch, 1).await.unwrap();

        ledger.abandon(&pending);

        let result = ledger.await_commit(pending).await;
        assert!(matches!(result, Err(LedgerError::UnknownReceipt(_))));
        assert_eq!(ledger.count(alice()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_creates_empty_ledger() {
        let (_, ledger, _dir) = temp_ledger();
        assert_eq!(ledger.count(alice()).await.unwrap(), 0);
        assert!(ledger.visits(alice()).await.unwrap().is_empty());
        assert!(ledger.visit(alice(), 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let (coprocessor, ledger, _dir) = temp_ledger();

        for ts in [300u64, 100, 200] {
            let batch = coprocessor.encrypt(scope(), alice(), vec![2, 202]).await.unwrap();
            ledger.append(alice(), batch, ts).await.unwrap();
        }

        let visits = ledger.visits(alice()).await.unwrap();
        let timestamps: Vec<u64> = visits.iter().map(|v| v.timestamp).collect();
        // Commit order, not timestamp order
        assert_eq!(timestamps, vec![300, 100, 200]);
        assert_eq!(visits[2].index, 2);
        assert_eq!(ledger.visit(alice(), 1).await.unwrap(), Some(visits[1]));
        assert_eq!(ledger.count(alice()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let (coprocessor, ledger, _dir) = temp_ledger();
        let batch = coprocessor.encrypt(scope(), alice(), vec![7, 21]).await.unwrap();
        ledger.append(alice(), batch, 1).await.unwrap();

        let batch = coprocessor.encrypt(scope(), bob(), vec![3, 301]).await.unwrap();
        assert_eq!(ledger.append(bob(), batch, 2).await.unwrap(), 0);

        assert_eq!(ledger.count(alice()).await.unwrap(), 1);
        assert_eq!(ledger.visits(bob()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replayed_proof_leaves_ledger_unchanged() {
        let (coprocessor, ledger, _dir) = temp_ledger();
        let batch = coprocessor.encrypt(scope(), alice(), vec![1, 101]).await.unwrap();

        ledger.append(alice(), batch.clone(), 1).await.unwrap();
        let replay = ledger.append(alice(), batch, 2).await;

        assert!(matches!(replay, Err(LedgerError::ProofReplayed)));
        assert_eq!(ledger.count(alice()).await.unwrap(), 1);
        assert!(ledger.visit(alice(), 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_proof_is_rejected() {
        let (coprocessor, ledger, _dir) = temp_ledger();
        let batch = coprocessor.encrypt(scope(), bob(), vec![1, 101]).await.unwrap();

        let result = ledger.append(alice(), batch, 1).await;
        assert!(matches!(result, Err(LedgerError::ProofRejected { .. })));
        assert_eq!(ledger.count(alice()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");
        let coprocessor = coprocessor();

        let first = {
            let ledger = RedbLedger::open(&path, scope(), Arc::new(coprocessor.clone())).unwrap();
            let batch = coprocessor.encrypt(scope(), alice(), vec![4, 401]).await.unwrap();
            ledger.append(alice(), batch, 1_700_000_000).await.unwrap();
            ledger.visit(alice(), 0).await.unwrap().unwrap()
        };

        let reopened = RedbLedger::open(&path, scope(), Arc::new(coprocessor.clone())).unwrap();
        assert_eq!(reopened.count(alice()).await.unwrap(), 1);
        assert_eq!(reopened.visit(alice(), 0).await.unwrap(), Some(first));

        // Next index continues after the persisted partition
        let batch = coprocessor.encrypt(scope(), alice(), vec![4, 402]).await.unwrap();
        assert_eq!(reopened.append(alice(), batch, 2).await.unwrap(), 1);
    }

    #[test]
    fn reopen_with_different_scope_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");
        let verifier: Arc<dyn ProofVerifier> = Arc::new(coprocessor());

        drop(RedbLedger::open(&path, scope(), Arc::clone(&verifier)).unwrap());

        let other = Scope(address!("0x0000000000000000000000000000000000000001"));
        let result = RedbLedger::open(&path, other, verifier);
        assert!(matches!(result, Err(DatabaseError::ScopeMismatch { .. })));
    }
}
