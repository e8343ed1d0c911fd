// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confidential-computation client.
//!
//! This module defines the capability set the core consumes from the
//! confidential-computation service:
//! - encrypting `uint32` inputs bound to a (scope, principal) pair
//! - issuing ephemeral session keypairs
//! - building the EIP-712 payload a principal signs
//! - batched user decryption under a signed grant
//!
//! [`LocalCoprocessor`] implements it in-process for development and tests.

pub mod eip712;
pub mod local;
pub mod types;

use std::future::Future;

use alloy::primitives::Bytes;

use crate::models::{Principal, Scope};

pub use eip712::{DecryptionDomain, SignablePayload, UserDecryptRequestVerification};
pub use local::LocalCoprocessor;
pub use types::{
    CiphertextHandle, DecryptedValues, EncryptedInputBatch, HandleScopePair, SessionKeypair,
    UserDecryptRequest,
};

/// Errors reported by the computation service.
#[derive(Debug, thiserror::Error)]
pub enum CoprocessorError {
    #[error("Computation service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed service output: {0}")]
    Malformed(String),

    #[error("Decryption not authorized: {0}")]
    Unauthorized(String),

    #[error("Grant validity window is not active")]
    OutsideValidityWindow,
}

/// Capability set of the confidential-computation service.
pub trait ComputationClient: Send + Sync {
    /// Encrypt `values` in order, producing one proof for the whole batch.
    fn encrypt(
        &self,
        scope: Scope,
        principal: Principal,
        values: Vec<u32>,
    ) -> impl Future<Output = Result<EncryptedInputBatch, CoprocessorError>> + Send;

    fn generate_keypair(&self) -> SessionKeypair;

    fn build_signable_payload(
        &self,
        public_key: &Bytes,
        scopes: &[Scope],
        valid_from: u64,
        valid_duration_days: u32,
    ) -> SignablePayload;

    /// Decrypt a batch; entries that may not be revealed are left out.
    fn decrypt_batch(
        &self,
        request: UserDecryptRequest,
    ) -> impl Future<Output = Result<DecryptedValues, CoprocessorError>> + Send;
}

/// Checks that an input batch was formed for a given scope and principal.
///
/// Ledgers hold this to reject batches minted elsewhere.
pub trait ProofVerifier: Send + Sync {
    fn verify_input_proof(
        &self,
        scope: Scope,
        principal: Principal,
        batch: &EncryptedInputBatch,
    ) -> bool;
}
