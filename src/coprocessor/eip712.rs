// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 typed data the principal signs to authorize a user decryption.
//!
//! The signature binds the session public key, the scopes, and the validity
//! window `[start, start + days)` under the decryption domain.

use std::borrow::Cow;

use alloy::{
    primitives::{Address, Bytes, Signature, B256, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};

use crate::models::{Principal, Scope};

/// EIP-712 domain name of the decryption verifier.
pub const DOMAIN_NAME: &str = "Decryption";

/// EIP-712 domain version of the decryption verifier.
pub const DOMAIN_VERSION: &str = "1";

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }
}

/// Where decryption signatures are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl DecryptionDomain {
    pub fn eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed(DOMAIN_NAME)),
            Some(Cow::Borrowed(DOMAIN_VERSION)),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// Structured payload handed to the principal's signer.
#[derive(Debug, Clone)]
pub struct SignablePayload {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl SignablePayload {
    pub fn new(
        domain: &DecryptionDomain,
        public_key: Bytes,
        scopes: &[Scope],
        valid_from: u64,
        valid_duration_days: u32,
    ) -> Self {
        Self {
            domain: domain.eip712(),
            message: UserDecryptRequestVerification {
                publicKey: public_key,
                contractAddresses: scopes.iter().map(|scope| scope.0).collect(),
                startTimestamp: U256::from(valid_from),
                durationDays: U256::from(valid_duration_days),
                extraData: Bytes::new(),
            },
        }
    }

    /// Digest the principal signs.
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    /// Principal that produced `signature` over this payload.
    pub fn recover_signer(
        &self,
        signature: &Signature,
    ) -> Result<Principal, alloy::primitives::SignatureError> {
        signature
            .recover_address_from_prehash(&self.signing_hash())
            .map(Principal)
    }
}
