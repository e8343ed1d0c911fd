// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal signing capability.
//!
//! The grant manager never holds a principal key; it hands the structured
//! payload to a [`PrincipalSigner`] and awaits the signature. The bundled
//! [`LocalPrincipalSigner`] loads a custodied secp256k1 key from PEM or hex.

use std::future::Future;

use alloy::{
    primitives::{Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::SecretKey;

use crate::coprocessor::SignablePayload;
use crate::models::Principal;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// External signer acting for one principal.
pub trait PrincipalSigner: Send + Sync {
    fn principal(&self) -> Principal;

    fn sign_payload(
        &self,
        payload: &SignablePayload,
    ) -> impl Future<Output = Result<Signature, SignerError>> + Send;
}

/// Parse a PEM private key (SEC1 or PKCS#8) into its hex encoding.
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, SignerError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| SignerError::InvalidKey(format!("Invalid UTF-8: {e}")))?;

    let pem = pem::parse(pem_str).map_err(|e| SignerError::InvalidKey(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents()).map_err(|e| e.to_string())
        })
        .map_err(|e| SignerError::InvalidKey(format!("Invalid key format: {e}")))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

/// Principal key held in process.
#[derive(Clone)]
pub struct LocalPrincipalSigner {
    signer: PrivateKeySigner,
}

impl LocalPrincipalSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Fresh key; for development runs without a configured principal.
    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, SignerError> {
        let hex_key = pem_to_hex(pem_bytes)?;
        Self::from_hex(&hex_key)
    }

    /// `0x`-optional 32-byte hex key.
    pub fn from_hex(hex_key: &str) -> Result<Self, SignerError> {
        let bytes: B256 = hex_key
            .trim()
            .parse()
            .map_err(|e| SignerError::InvalidKey(format!("Invalid hex key: {e}")))?;
        PrivateKeySigner::from_bytes(&bytes)
            .map(Self::new)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for LocalPrincipalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPrincipalSigner")
            .field("principal", &self.principal())
            .finish_non_exhaustive()
    }
}

impl PrincipalSigner for LocalPrincipalSigner {
    fn principal(&self) -> Principal {
        Principal(self.signer.address())
    }

    async fn sign_payload(&self, payload: &SignablePayload) -> Result<Signature, SignerError> {
        self.signer
            .sign_hash_sync(&payload.signing_hash())
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coprocessor::DecryptionDomain;
    use crate::models::Scope;
    use alloy::primitives::{address, Bytes};
    use k256::pkcs8::{EncodePrivateKey, LineEnding};

    const TEST_KEY: [u8; 32] = [0x42; 32];

    fn test_secret() -> SecretKey {
        SecretKey::from_slice(&TEST_KEY).unwrap()
    }

    fn payload() -> SignablePayload {
        SignablePayload::new(
            &DecryptionDomain {
                chain_id: 11_155_111,
                verifying_contract: address!("0xb6e160b1ff80d67bfe90a85ee06ce0a2613607d1"),
            },
            Bytes::from(vec![4u8; 65]),
            &[Scope(address!("0x749b19f59b2264f846cff9d68bdb098ce63e31ad"))],
            1_700_000_000,
            7,
        )
    }

    #[test]
    fn test_pem_to_hex_pkcs8() {
        let pem = test_secret().to_pkcs8_pem(LineEnding::LF).unwrap();
        let hex = pem_to_hex(pem.as_bytes()).unwrap();
        assert_eq!(hex, alloy::hex::encode(TEST_KEY));
    }

    #[test]
    fn test_pem_to_hex_sec1() {
        let pem = test_secret().to_sec1_pem(LineEnding::LF).unwrap();
        let hex = pem_to_hex(pem.as_bytes()).unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pem_rejects_garbage() {
        assert!(matches!(
            pem_to_hex(b"not a pem"),
            Err(SignerError::InvalidKey(_))
        ));
    }

    #[test]
    fn pem_and_hex_yield_the_same_principal() {
        let pem = test_secret().to_pkcs8_pem(LineEnding::LF).unwrap();
        let from_pem = LocalPrincipalSigner::from_pem(pem.as_bytes()).unwrap();
        let from_hex =
            LocalPrincipalSigner::from_hex(&format!("0x{}", alloy::hex::encode(TEST_KEY))).unwrap();
        assert_eq!(from_pem.principal(), from_hex.principal());
    }

    #[test]
    fn from_hex_rejects_short_keys() {
        assert!(LocalPrincipalSigner::from_hex("0x1234").is_err());
    }

    #[tokio::test]
    async fn signature_recovers_to_principal() {
        let signer = LocalPrincipalSigner::random();
        let payload = payload();
        let signature = signer.sign_payload(&payload).await.unwrap();
        assert_eq!(payload.recover_signer(&signature).unwrap(), signer.principal());
    }

    #[test]
    fn debug_does_not_print_key() {
        let signer = LocalPrincipalSigner::from_hex(&alloy::hex::encode(TEST_KEY)).unwrap();
        let debug = format!("{signer:?}");
        assert!(!debug.contains(&alloy::hex::encode(TEST_KEY)));
    }
}
