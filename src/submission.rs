// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Record Submission
//!
//! Drives one encrypt-and-append run per call:
//!
//! ```text
//! Idle ──► Encoding ──► Submitting ──► Confirming ──► Confirmed
//!              │             │              │
//!              └─────────────┴──────────────┴──────► Failed
//! ```
//!
//! At most one run is in flight per principal. A failed run is never retried
//! here; the caller starts a new run, which re-encodes and so carries a fresh
//! proof.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::catalog::LocationId;
use crate::coprocessor::{ComputationClient, CoprocessorError};
use crate::encoder::RecordEncoder;
use crate::ledger::{LedgerError, VisitLedger};
use crate::models::Principal;
use crate::util::{guarded, Guarded};

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Encoding,
    Submitting,
    Confirming,
    Confirmed,
    Failed,
}

impl SubmissionState {
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            SubmissionState::Encoding | SubmissionState::Submitting | SubmissionState::Confirming
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Invalid visit: {0}")]
    Validation(String),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] CoprocessorError),

    #[error("A submission is already in progress for {0}")]
    InProgress(Principal),

    #[error("Ledger append failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Submission cancelled")]
    Cancelled,

    #[error("Timed out waiting for ledger commitment")]
    Timeout,
}

/// Unvalidated visit as entered by the caller; `None` means not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitDraft {
    pub country_id: Option<LocationId>,
    pub city_id: Option<LocationId>,
    pub timestamp: u64,
}

impl VisitDraft {
    pub fn new(country_id: LocationId, city_id: LocationId, timestamp: u64) -> Self {
        Self {
            country_id: Some(country_id),
            city_id: Some(city_id),
            timestamp,
        }
    }

    /// Both ids must be selected. Values are never checked against the catalog.
    pub fn validate(&self) -> Result<(LocationId, LocationId), SubmissionError> {
        match (self.country_id, self.city_id) {
            (Some(country), Some(city)) => Ok((country, city)),
            (None, _) => Err(SubmissionError::Validation(
                "country_id is required".to_string(),
            )),
            (_, None) => Err(SubmissionError::Validation("city_id is required".to_string())),
        }
    }
}

/// Outcome of a confirmed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub index: u64,
    pub timestamp: u64,
}

type Sessions = Mutex<HashMap<Principal, SubmissionState>>;

fn lock(sessions: &Sessions) -> std::sync::MutexGuard<'_, HashMap<Principal, SubmissionState>> {
    // State is a plain map of enums; a poisoned lock still holds usable data
    sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tracks one run's state and marks it `Failed` if dropped mid-flight.
struct Run<'a> {
    sessions: &'a Sessions,
    principal: Principal,
}

impl<'a> Run<'a> {
    /// Atomically check the guard and enter `Encoding`.
    fn begin(sessions: &'a Sessions, principal: Principal) -> Result<Self, SubmissionError> {
        let mut map = lock(sessions);
        let current = map.get(&principal).copied().unwrap_or_default();
        if current.is_in_flight() {
            return Err(SubmissionError::InProgress(principal));
        }
        map.insert(principal, SubmissionState::Encoding);
        debug!(%principal, from = ?current, to = ?SubmissionState::Encoding, "Submission transition");
        Ok(Self {
            sessions,
            principal,
        })
    }

    fn advance(&self, to: SubmissionState) {
        let mut map = lock(self.sessions);
        let from = map.insert(self.principal, to).unwrap_or_default();
        debug!(principal = %self.principal, ?from, ?to, "Submission transition");
    }

    fn fail(&self, err: SubmissionError) -> SubmissionError {
        self.advance(SubmissionState::Failed);
        warn!(principal = %self.principal, error = %err, "Submission failed");
        err
    }

    /// Forget this run; its outcome is no longer relevant to the caller.
    fn discard(&self) {
        lock(self.sessions).remove(&self.principal);
        debug!(principal = %self.principal, "Submission result discarded");
    }
}

impl Drop for Run<'_> {
    fn drop(&mut self) {
        let mut map = lock(self.sessions);
        if let Some(state) = map.get_mut(&self.principal) {
            if state.is_in_flight() {
                *state = SubmissionState::Failed;
            }
        }
    }
}

/// Record Submission Protocol over one encoder and one ledger.
pub struct VisitSubmitter<C, L> {
    encoder: RecordEncoder<C>,
    ledger: Arc<L>,
    sessions: Sessions,
    commit_timeout: Option<Duration>,
}

impl<C, L> VisitSubmitter<C, L>
where
    C: ComputationClient,
    L: VisitLedger,
{
    pub fn new(client: Arc<C>, ledger: Arc<L>, commit_timeout: Option<Duration>) -> Self {
        Self {
            encoder: RecordEncoder::new(client),
            ledger,
            sessions: Mutex::new(HashMap::new()),
            commit_timeout,
        }
    }

    /// Most recent state for `principal` (`Idle` if none).
    pub fn state(&self, principal: Principal) -> SubmissionState {
        lock(&self.sessions)
            .get(&principal)
            .copied()
            .unwrap_or_default()
    }

    pub async fn submit(
        &self,
        principal: Principal,
        draft: VisitDraft,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let (country, city) = draft.validate()?;
        let run = Run::begin(&self.sessions, principal)?;
        let scope = self.ledger.scope();

        let batch = match guarded(
            cancel,
            None,
            self.encoder.encode(country, city, scope, principal),
        )
        .await
        {
            Guarded::Completed(Ok(batch)) => batch,
            Guarded::Completed(Err(err)) => return Err(run.fail(err.into())),
            Guarded::Cancelled => return Err(run.fail(SubmissionError::Cancelled)),
            Guarded::TimedOut => return Err(run.fail(SubmissionError::Timeout)),
        };

        // Nothing has left for the ledger yet; a torn-down caller gets no append
        if cancel.is_cancelled() {
            return Err(run.fail(SubmissionError::Cancelled));
        }

        run.advance(SubmissionState::Submitting);
        let pending = match self
            .ledger
            .submit_append(principal, batch, draft.timestamp)
            .await
        {
            Ok(pending) => pending,
            Err(err) => return Err(run.fail(err.into())),
        };

        run.advance(SubmissionState::Confirming);
        let recorded = match guarded(
            cancel,
            self.commit_timeout,
            self.ledger.await_commit(pending),
        )
        .await
        {
            Guarded::Completed(Ok(recorded)) => recorded,
            Guarded::Completed(Err(err)) => return Err(run.fail(err.into())),
            Guarded::Cancelled => {
                self.ledger.abandon(&pending);
                return Err(run.fail(SubmissionError::Cancelled));
            }
            Guarded::TimedOut => {
                self.ledger.abandon(&pending);
                return Err(run.fail(SubmissionError::Timeout));
            }
        };

        if cancel.is_cancelled() {
            run.discard();
            return Err(SubmissionError::Cancelled);
        }

        run.advance(SubmissionState::Confirmed);
        info!(%principal, index = recorded.index, "Submission confirmed");

        Ok(SubmissionReceipt {
            index: recorded.index,
            timestamp: recorded.timestamp,
        })
    }
}
