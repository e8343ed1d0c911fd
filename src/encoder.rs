// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turns plaintext location identifiers into an encrypted input batch.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::LocationId;
use crate::coprocessor::{ComputationClient, CoprocessorError, EncryptedInputBatch};
use crate::ledger::VISIT_BATCH_LEN;
use crate::models::{Principal, Scope};

/// Encodes a (country, city) pair as one batch: `handles[0]` is the country,
/// `handles[1]` the city, with a single proof covering both.
pub struct RecordEncoder<C> {
    client: Arc<C>,
}

impl<C: ComputationClient> RecordEncoder<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn encode(
        &self,
        country: LocationId,
        city: LocationId,
        scope: Scope,
        principal: Principal,
    ) -> Result<EncryptedInputBatch, CoprocessorError> {
        let batch = self
            .client
            .encrypt(scope, principal, vec![country, city])
            .await?;

        if batch.handles.len() != VISIT_BATCH_LEN {
            return Err(CoprocessorError::Malformed(format!(
                "expected {VISIT_BATCH_LEN} handles, got {}",
                batch.handles.len()
            )));
        }
        if batch.proof.is_empty() {
            return Err(CoprocessorError::Malformed("empty input proof".to_string()));
        }

        debug!(%principal, %scope, "Encoded visit batch");
        Ok(batch)
    }
}
