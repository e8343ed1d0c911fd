// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Value types exchanged with the confidential-computation service.

use std::collections::HashMap;

use alloy::{
    primitives::{Bytes, Signature, B256},
    signers::local::PrivateKeySigner,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Principal, Scope};

/// Opaque reference to an encrypted value.
///
/// Plain 32-byte value; copying it grants nothing. Resolving it requires the
/// computation service, a valid grant, and the owning principal.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
#[schema(
    value_type = String,
    example = "0x9f2c1e04a7b35d6e8f10c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b4c5d"
)]
pub struct CiphertextHandle(pub B256);

impl CiphertextHandle {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl std::fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<[u8; 32]> for CiphertextHandle {
    fn from(value: [u8; 32]) -> Self {
        CiphertextHandle(B256::from(value))
    }
}

/// Ordered ciphertext handles plus one validity proof covering all of them.
///
/// Consumed by exactly one ledger append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInputBatch {
    pub handles: Vec<CiphertextHandle>,
    pub proof: Bytes,
}

/// A handle together with the scope it was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleScopePair {
    pub handle: CiphertextHandle,
    pub scope: Scope,
}

/// Ephemeral secp256k1 keypair for one decryption session.
///
/// Never persisted; dropped with the session.
#[derive(Clone)]
pub struct SessionKeypair {
    /// Uncompressed SEC1 public key (65 bytes).
    pub public_key: Bytes,
    pub private_key: B256,
}

impl SessionKeypair {
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            public_key: public_key_of(&signer),
            private_key: signer.to_bytes(),
        }
    }

    /// Whether `private_key` is the secret half of `public_key`.
    pub fn matches(public_key: &Bytes, private_key: &B256) -> bool {
        match PrivateKeySigner::from_bytes(private_key) {
            Ok(signer) => &public_key_of(&signer) == public_key,
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn public_key_of(signer: &PrivateKeySigner) -> Bytes {
    let point = signer.credential().verifying_key().to_encoded_point(false);
    Bytes::copy_from_slice(point.as_bytes())
}

/// Everything the service needs to authorize one batched user decryption.
#[derive(Debug, Clone)]
pub struct UserDecryptRequest {
    pub handles: Vec<HandleScopePair>,
    pub private_key: B256,
    pub public_key: Bytes,
    pub signature: Signature,
    pub scopes: Vec<Scope>,
    pub principal: Principal,
    pub valid_from: u64,
    pub valid_duration_days: u32,
}

/// Plaintexts returned by a batched decryption.
///
/// Entries the service declined to reveal are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptedValues(HashMap<CiphertextHandle, u64>);

impl DecryptedValues {
    /// Value used by callers that need a number for a missing entry.
    pub const SENTINEL: u64 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: CiphertextHandle, value: u64) {
        self.0.insert(handle, value);
    }

    pub fn get(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.0.get(handle).copied()
    }

    pub fn value_or_sentinel(&self, handle: &CiphertextHandle) -> u64 {
        self.get(handle).unwrap_or(Self::SENTINEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(CiphertextHandle, u64)> for DecryptedValues {
    fn from_iter<I: IntoIterator<Item = (CiphertextHandle, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_halves_match() {
        let keypair = SessionKeypair::generate();
        assert_eq!(keypair.public_key.len(), 65);
        assert!(SessionKeypair::matches(
            &keypair.public_key,
            &keypair.private_key
        ));

        let other = SessionKeypair::generate();
        assert!(!SessionKeypair::matches(
            &keypair.public_key,
            &other.private_key
        ));
    }

    #[test]
    fn keypair_debug_redacts_private_key() {
        let keypair = SessionKeypair::generate();
        let debug = format!("{keypair:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&keypair.private_key.to_string()));
    }

    #[test]
    fn missing_values_fall_back_to_sentinel() {
        let present = CiphertextHandle::from([1u8; 32]);
        let missing = CiphertextHandle::from([2u8; 32]);
        let values: DecryptedValues = [(present, 44)].into_iter().collect();

        assert_eq!(values.get(&present), Some(44));
        assert_eq!(values.get(&missing), None);
        assert_eq!(values.value_or_sentinel(&missing), DecryptedValues::SENTINEL);
    }
}
