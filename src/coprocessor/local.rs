// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process confidential-computation service.
//!
//! Stateless: everything needed to open a handle is derived from the service
//! seed, so handles stay resolvable across restarts when the seed is pinned
//! (`COPROCESSOR_SEED`).
//!
//! ## Handle Layout
//!
//! ```text
//! [ nonce: 12 | masked value: 4 | tag: 16 ]
//! ```
//!
//! - `masked = value XOR HMAC(seed, "mask" | nonce)[..4]`
//! - `tag = HMAC(seed, "tag" | nonce | masked | scope | owner)[..16]`
//!
//! The tag ties each handle to the scope it was encrypted for and the
//! principal that owns it; a decryption request naming any other scope or
//! principal cannot open it.
//!
//! The input proof is `HMAC(seed, "proof" | scope | principal | handles...)`.

use alloy::primitives::{Bytes, B256};
use hmac::{
    digest::{generic_array::GenericArray, KeyInit},
    Hmac, Mac,
};
use sha2::Sha256;
use uuid::Uuid;

use super::{
    CiphertextHandle, ComputationClient, CoprocessorError, DecryptedValues, DecryptionDomain,
    EncryptedInputBatch, HandleScopePair, ProofVerifier, SessionKeypair, SignablePayload,
    UserDecryptRequest,
};
use crate::models::{Principal, Scope};
use crate::util::unix_now;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const VALUE_LEN: usize = 4;
const TAG_LEN: usize = 16;

const SECONDS_PER_DAY: u64 = 86_400;

/// Local implementation of [`ComputationClient`] and [`ProofVerifier`].
#[derive(Clone)]
pub struct LocalCoprocessor {
    mac: HmacSha256,
    domain: DecryptionDomain,
}

impl LocalCoprocessor {
    /// Create a service keyed by a fixed seed.
    pub fn new(seed: [u8; 32], domain: DecryptionDomain) -> Self {
        // HMAC zero-pads short keys to the block size
        let mut key = [0u8; 64];
        key[..32].copy_from_slice(&seed);
        Self {
            mac: <HmacSha256 as KeyInit>::new(GenericArray::from_slice(&key)),
            domain,
        }
    }

    /// Create a service with a fresh random seed. Handles do not survive
    /// the process.
    pub fn random(domain: DecryptionDomain) -> Self {
        let mut seed = [0u8; 32];
        seed[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        seed[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self::new(seed, domain)
    }

    fn keyed(&self, label: &[u8], parts: &[&[u8]]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(label);
        for part in parts {
            mac.update(&(part.len() as u32).to_be_bytes());
            mac.update(part);
        }
        mac
    }

    fn mask(&self, nonce: &[u8]) -> [u8; VALUE_LEN] {
        let digest = self.keyed(b"mask", &[nonce]).finalize().into_bytes();
        let mut mask = [0u8; VALUE_LEN];
        mask.copy_from_slice(&digest[..VALUE_LEN]);
        mask
    }

    fn tag_mac(&self, nonce: &[u8], masked: &[u8], scope: Scope, owner: Principal) -> HmacSha256 {
        self.keyed(b"tag", &[nonce, masked, scope.as_bytes(), owner.as_bytes()])
    }

    fn proof_mac(
        &self,
        scope: Scope,
        principal: Principal,
        handles: &[CiphertextHandle],
    ) -> HmacSha256 {
        let mut parts: Vec<&[u8]> = vec![scope.as_bytes(), principal.as_bytes()];
        parts.extend(handles.iter().map(|handle| handle.as_bytes().as_slice()));
        self.keyed(b"proof", &parts)
    }

    fn seal(&self, scope: Scope, owner: Principal, value: u32) -> CiphertextHandle {
        let mut bytes = [0u8; 32];
        bytes[..NONCE_LEN].copy_from_slice(&Uuid::new_v4().as_bytes()[..NONCE_LEN]);

        let mask = self.mask(&bytes[..NONCE_LEN]);
        for (i, byte) in value.to_be_bytes().iter().enumerate() {
            bytes[NONCE_LEN + i] = byte ^ mask[i];
        }

        let (body, tag_slot) = bytes.split_at_mut(NONCE_LEN + VALUE_LEN);
        let tag = self
            .tag_mac(&body[..NONCE_LEN], &body[NONCE_LEN..], scope, owner)
            .finalize()
            .into_bytes();
        tag_slot.copy_from_slice(&tag[..TAG_LEN]);

        CiphertextHandle::from(bytes)
    }

    /// Open a handle for `owner` under the scope named in `pair`.
    fn open(&self, pair: &HandleScopePair, owner: Principal) -> Option<u32> {
        let bytes = pair.handle.as_bytes();
        let nonce = &bytes[..NONCE_LEN];
        let masked = &bytes[NONCE_LEN..NONCE_LEN + VALUE_LEN];
        let tag = &bytes[NONCE_LEN + VALUE_LEN..];

        self.tag_mac(nonce, masked, pair.scope, owner)
            .verify_truncated_left(tag)
            .ok()?;

        let mask = self.mask(nonce);
        let mut value = [0u8; VALUE_LEN];
        for i in 0..VALUE_LEN {
            value[i] = masked[i] ^ mask[i];
        }
        Some(u32::from_be_bytes(value))
    }

    fn authorize(&self, request: &UserDecryptRequest, now: u64) -> Result<(), CoprocessorError> {
        let window = u64::from(request.valid_duration_days).saturating_mul(SECONDS_PER_DAY);
        let valid_until = request.valid_from.saturating_add(window);
        if now < request.valid_from || now >= valid_until {
            return Err(CoprocessorError::OutsideValidityWindow);
        }

        let payload = self.build_signable_payload(
            &request.public_key,
            &request.scopes,
            request.valid_from,
            request.valid_duration_days,
        );
        let signer = payload
            .recover_signer(&request.signature)
            .map_err(|e| CoprocessorError::Unauthorized(format!("Invalid signature: {e}")))?;
        if signer != request.principal {
            return Err(CoprocessorError::Unauthorized(format!(
                "Signature by {signer} does not authorize {}",
                request.principal
            )));
        }

        if !SessionKeypair::matches(&request.public_key, &request.private_key) {
            return Err(CoprocessorError::Unauthorized(
                "Session private key does not match public key".to_string(),
            ));
        }

        Ok(())
    }

    /// Batched decryption evaluated at a given unix time.
    pub fn decrypt_at(
        &self,
        request: &UserDecryptRequest,
        now: u64,
    ) -> Result<DecryptedValues, CoprocessorError> {
        self.authorize(request, now)?;

        let values = request
            .handles
            .iter()
            .filter(|pair| request.scopes.contains(&pair.scope))
            .filter_map(|pair| {
                self.open(pair, request.principal)
                    .map(|value| (pair.handle, u64::from(value)))
            })
            .collect::<DecryptedValues>();

        tracing::debug!(
            principal = %request.principal,
            requested = request.handles.len(),
            revealed = values.len(),
            "Local coprocessor decrypted batch"
        );

        Ok(values)
    }
}

impl ComputationClient for LocalCoprocessor {
    async fn encrypt(
        &self,
        scope: Scope,
        principal: Principal,
        values: Vec<u32>,
    ) -> Result<EncryptedInputBatch, CoprocessorError> {
        if values.is_empty() {
            return Err(CoprocessorError::Malformed(
                "Encrypted input needs at least one value".to_string(),
            ));
        }

        let handles: Vec<CiphertextHandle> = values
            .into_iter()
            .map(|value| self.seal(scope, principal, value))
            .collect();
        let proof = self
            .proof_mac(scope, principal, &handles)
            .finalize()
            .into_bytes();

        Ok(EncryptedInputBatch {
            handles,
            proof: Bytes::copy_from_slice(&proof),
        })
    }

    fn generate_keypair(&self) -> SessionKeypair {
        SessionKeypair::generate()
    }

    fn build_signable_payload(
        &self,
        public_key: &Bytes,
        scopes: &[Scope],
        valid_from: u64,
        valid_duration_days: u32,
    ) -> SignablePayload {
        SignablePayload::new(
            &self.domain,
            public_key.clone(),
            scopes,
            valid_from,
            valid_duration_days,
        )
    }

    async fn decrypt_batch(
        &self,
        request: UserDecryptRequest,
    ) -> Result<DecryptedValues, CoprocessorError> {
        self.decrypt_at(&request, unix_now())
    }
}

impl ProofVerifier for LocalCoprocessor {
    fn verify_input_proof(
        &self,
        scope: Scope,
        principal: Principal,
        batch: &EncryptedInputBatch,
    ) -> bool {
        self.proof_mac(scope, principal, &batch.handles)
            .verify_slice(&batch.proof)
            .is_ok()
    }
}

/// Seed parsed from a `0x`-optional hex string.
pub fn parse_seed(raw: &str) -> Result<[u8; 32], alloy::hex::FromHexError> {
    raw.trim().parse::<B256>().map(|seed| seed.0)
}
