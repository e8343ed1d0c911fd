// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Grant Manager
//!
//! One grant per decryption session:
//!
//! 1. [`GrantManager::begin_session`] generates a fresh keypair and the
//!    payload `(publicKey, scopes, validFrom = now, validDurationDays)`
//! 2. the principal signs the payload
//! 3. [`GrantManager::complete_session`] checks the signer and yields a
//!    usable [`DecryptionGrant`]
//! 4. [`GrantManager::decrypt_batch`] submits every handle in one request
//!
//! Grants live only as long as the session value; nothing is cached or
//! persisted between sessions.

use std::sync::Arc;

use alloy::primitives::Signature;
use tracing::{debug, info};
use uuid::Uuid;

use crate::coprocessor::{
    CiphertextHandle, ComputationClient, CoprocessorError, DecryptedValues, HandleScopePair,
    SessionKeypair, SignablePayload, UserDecryptRequest,
};
use crate::ledger::LedgerError;
use crate::models::{Principal, Scope};
use crate::signer::SignerError;
use crate::util::unix_now;

pub const DEFAULT_GRANT_DURATION_DAYS: u32 = 7;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("Signature was not produced by {expected}")]
    SignatureRejected { expected: Principal },

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Decryption grant is outside its validity window")]
    GrantExpired,

    #[error("Decryption failed: {0}")]
    Decryption(#[from] CoprocessorError),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Decryption session cancelled")]
    Cancelled,

    #[error("Timed out waiting for the principal's signature")]
    Timeout,
}

/// Unsigned grant: the payload still awaits the principal's signature.
#[derive(Debug, Clone)]
pub struct PendingGrant {
    pub session_id: Uuid,
    pub principal: Principal,
    pub keypair: SessionKeypair,
    pub scopes: Vec<Scope>,
    pub valid_from: u64,
    pub valid_duration_days: u32,
    pub payload: SignablePayload,
}

/// Signed grant, usable until its window elapses.
#[derive(Debug, Clone)]
pub struct DecryptionGrant {
    pub session_id: Uuid,
    pub principal: Principal,
    pub keypair: SessionKeypair,
    pub scopes: Vec<Scope>,
    pub valid_from: u64,
    pub valid_duration_days: u32,
    pub signature: Signature,
}

impl DecryptionGrant {
    /// First second outside the window.
    pub fn valid_until(&self) -> u64 {
        self.valid_from
            .saturating_add(u64::from(self.valid_duration_days).saturating_mul(SECONDS_PER_DAY))
    }

    /// `now ∈ [valid_from, valid_from + days)`
    pub fn is_active_at(&self, now: u64) -> bool {
        now >= self.valid_from && now < self.valid_until()
    }
}

pub struct GrantManager<C> {
    client: Arc<C>,
    duration_days: u32,
}

impl<C: ComputationClient> GrantManager<C> {
    pub fn new(client: Arc<C>, duration_days: u32) -> Self {
        Self {
            client,
            duration_days,
        }
    }

    pub fn begin_session(&self, principal: Principal, scope: Scope) -> PendingGrant {
        self.begin_session_at(principal, vec![scope], unix_now())
    }

    pub fn begin_session_at(
        &self,
        principal: Principal,
        scopes: Vec<Scope>,
        now: u64,
    ) -> PendingGrant {
        let keypair = self.client.generate_keypair();
        let payload = self.client.build_signable_payload(
            &keypair.public_key,
            &scopes,
            now,
            self.duration_days,
        );
        let session_id = Uuid::new_v4();

        debug!(%session_id, %principal, valid_from = now, days = self.duration_days, "Decryption session started");

        PendingGrant {
            session_id,
            principal,
            keypair,
            scopes,
            valid_from: now,
            valid_duration_days: self.duration_days,
            payload,
        }
    }

    /// Attach the principal's signature; any other signer is rejected.
    pub fn complete_session(
        &self,
        pending: PendingGrant,
        signature: Signature,
    ) -> Result<DecryptionGrant, DecryptionError> {
        let recovered = pending.payload.recover_signer(&signature).ok();
        if recovered != Some(pending.principal) {
            return Err(DecryptionError::SignatureRejected {
                expected: pending.principal,
            });
        }

        debug!(session_id = %pending.session_id, principal = %pending.principal, "Decryption grant signed");

        Ok(DecryptionGrant {
            session_id: pending.session_id,
            principal: pending.principal,
            keypair: pending.keypair,
            scopes: pending.scopes,
            valid_from: pending.valid_from,
            valid_duration_days: pending.valid_duration_days,
            signature,
        })
    }

    /// Decrypt handles registered under the grant's primary scope, in one call.
    pub async fn decrypt_batch(
        &self,
        grant: &DecryptionGrant,
        handles: &[CiphertextHandle],
    ) -> Result<DecryptedValues, DecryptionError> {
        self.decrypt_batch_at(grant, handles, unix_now()).await
    }

    pub async fn decrypt_batch_at(
        &self,
        grant: &DecryptionGrant,
        handles: &[CiphertextHandle],
        now: u64,
    ) -> Result<DecryptedValues, DecryptionError> {
        let Some(&scope) = grant.scopes.first() else {
            return Ok(DecryptedValues::new());
        };
        let pairs = handles
            .iter()
            .map(|&handle| HandleScopePair { handle, scope })
            .collect();
        self.decrypt_pairs_at(grant, pairs, now).await
    }

    /// Decrypt explicit (handle, scope) pairs, in one call.
    pub async fn decrypt_pairs_at(
        &self,
        grant: &DecryptionGrant,
        pairs: Vec<HandleScopePair>,
        now: u64,
    ) -> Result<DecryptedValues, DecryptionError> {
        if !grant.is_active_at(now) {
            return Err(DecryptionError::GrantExpired);
        }
        if pairs.is_empty() {
            return Ok(DecryptedValues::new());
        }

        let requested = pairs.len();
        let request = UserDecryptRequest {
            handles: pairs,
            private_key: grant.keypair.private_key,
            public_key: grant.keypair.public_key.clone(),
            signature: grant.signature,
            scopes: grant.scopes.clone(),
            principal: grant.principal,
            valid_from: grant.valid_from,
            valid_duration_days: grant.valid_duration_days,
        };

        let values = self.client.decrypt_batch(request).await?;
        info!(
            session_id = %grant.session_id,
            principal = %grant.principal,
            requested,
            revealed = values.len(),
            "Decryption batch completed"
        );
        Ok(values)
    }
}
