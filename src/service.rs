// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exposed operations over one registry: submit, list, and decrypt visits.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::LocationCatalog;
use crate::coprocessor::ComputationClient;
use crate::grants::{DecryptionError, GrantManager, DEFAULT_GRANT_DURATION_DAYS};
use crate::ledger::{LedgerResult, VisitLedger, VisitRecord};
use crate::models::{Principal, Scope};
use crate::reconcile::{reconcile, DisclosedVisit};
use crate::signer::PrincipalSigner;
use crate::submission::{
    SubmissionError, SubmissionReceipt, SubmissionState, VisitDraft, VisitSubmitter,
};
use crate::util::{guarded, Guarded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub grant_duration_days: u32,
    /// `None` waits indefinitely.
    pub commit_timeout: Option<Duration>,
    /// `None` waits indefinitely.
    pub signature_timeout: Option<Duration>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            grant_duration_days: DEFAULT_GRANT_DURATION_DAYS,
            commit_timeout: None,
            signature_timeout: None,
        }
    }
}

pub struct VisitService<C, L> {
    ledger: Arc<L>,
    submitter: VisitSubmitter<C, L>,
    grants: GrantManager<C>,
    catalog: &'static LocationCatalog,
    signature_timeout: Option<Duration>,
}

impl<C, L> VisitService<C, L>
where
    C: ComputationClient,
    L: VisitLedger,
{
    pub fn new(client: Arc<C>, ledger: Arc<L>, options: ServiceOptions) -> Self {
        Self {
            submitter: VisitSubmitter::new(
                Arc::clone(&client),
                Arc::clone(&ledger),
                options.commit_timeout,
            ),
            grants: GrantManager::new(client, options.grant_duration_days),
            ledger,
            catalog: LocationCatalog::standard(),
            signature_timeout: options.signature_timeout,
        }
    }

    pub fn scope(&self) -> Scope {
        self.ledger.scope()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn catalog(&self) -> &'static LocationCatalog {
        self.catalog
    }

    pub async fn submit_visit(
        &self,
        principal: Principal,
        draft: VisitDraft,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.submitter.submit(principal, draft, cancel).await
    }

    pub fn submission_state(&self, principal: Principal) -> SubmissionState {
        self.submitter.state(principal)
    }

    pub async fn list_visits(&self, principal: Principal) -> LedgerResult<Vec<VisitRecord>> {
        self.ledger.visits(principal).await
    }

    pub async fn visit_count(&self, principal: Principal) -> LedgerResult<u64> {
        self.ledger.count(principal).await
    }

    pub async fn visit(&self, principal: Principal, index: u64) -> LedgerResult<Option<VisitRecord>> {
        self.ledger.visit(principal, index).await
    }

    /// Run one decryption session for the signer's principal.
    ///
    /// Works on a snapshot of the partition taken at the start; later appends
    /// appear in the next session.
    pub async fn decrypt_visits<S: PrincipalSigner>(
        &self,
        signer: &S,
        cancel: &CancellationToken,
    ) -> Result<Vec<DisclosedVisit>, DecryptionError> {
        let principal = signer.principal();
        let records = self.ledger.visits(principal).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pending = self.grants.begin_session(principal, self.scope());
        let session_id = pending.session_id;

        let signature = match guarded(
            cancel,
            self.signature_timeout,
            signer.sign_payload(&pending.payload),
        )
        .await
        {
            Guarded::Completed(result) => result?,
            Guarded::Cancelled => return Err(DecryptionError::Cancelled),
            Guarded::TimedOut => return Err(DecryptionError::Timeout),
        };
        let grant = self.grants.complete_session(pending, signature)?;

        let handles: Vec<_> = records
            .iter()
            .flat_map(|record| [record.country_handle, record.city_handle])
            .collect();
        let values = match guarded(cancel, None, self.grants.decrypt_batch(&grant, &handles)).await {
            Guarded::Completed(result) => result?,
            Guarded::Cancelled => return Err(DecryptionError::Cancelled),
            Guarded::TimedOut => return Err(DecryptionError::Timeout),
        };

        // The caller may have gone away while the service was working
        if cancel.is_cancelled() {
            return Err(DecryptionError::Cancelled);
        }

        let visits = reconcile(self.catalog, &records, &values);
        info!(%session_id, %principal, records = visits.len(), "Visits decrypted");
        Ok(visits)
    }
}
