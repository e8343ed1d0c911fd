// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the identity newtypes shared by every layer and the
//! request and response structures used by the REST API. All wire types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for automatic JSON
//! handling and OpenAPI documentation.
//!
//! ## Identity Types
//!
//! - [`Principal`]: the account a visit belongs to (ledger partition key)
//! - [`Scope`]: the registry a proof or grant is bound to
//!
//! Both wrap an EVM [`Address`] and serialize as `0x`-prefixed hex.

use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::LocationId;
use crate::ledger::VisitRecord;
use crate::reconcile::DisclosedVisit;
use crate::submission::SubmissionState;

// =============================================================================
// Identity Types
// =============================================================================

/// Account identity on whose behalf visits are recorded and decrypted.
///
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes).
///
/// # Example
///
/// ```rust,ignore
/// let principal: Principal = "0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12".parse()?;
/// ```
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
#[schema(value_type = String, example = "0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12")]
pub struct Principal(pub Address);

impl Principal {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Address> for Principal {
    fn from(value: Address) -> Self {
        Principal(value)
    }
}

impl FromStr for Principal {
    type Err = alloy::hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(Principal)
    }
}

/// Opaque scope identifier (the registry contract address).
///
/// Input proofs and decryption grants are bound to a scope; a proof minted
/// for one scope is rejected by a ledger serving another.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
#[schema(value_type = String, example = "0x749b19F59B2264f846cFf9D68bDB098CE63E31aD")]
pub struct Scope(pub Address);

impl Scope {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Address> for Scope {
    fn from(value: Address) -> Self {
        Scope(value)
    }
}

impl FromStr for Scope {
    type Err = alloy::hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(Scope)
    }
}

// =============================================================================
// Registry Models
// =============================================================================

/// Registry identity served by this instance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RegistryInfo {
    /// Scope (registry address) every proof and grant is bound to.
    pub scope: Scope,
    /// Principal custodied by this instance.
    pub principal: Principal,
    /// Chain ID of the EIP-712 decryption domain.
    pub chain_id: u64,
    /// Ledger backend (`memory` or `redb`).
    pub ledger: String,
}

// =============================================================================
// Visit Models
// =============================================================================

/// Request to record a new visit for the custodied principal.
///
/// Both identifiers must be present; a missing selection is rejected
/// before anything is encrypted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
pub struct SubmitVisitRequest {
    /// Country identifier from the location catalog.
    pub country_id: Option<LocationId>,
    /// City identifier from the location catalog.
    pub city_id: Option<LocationId>,
    /// Unix timestamp of the visit (seconds). Defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Confirmation of a recorded visit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SubmitVisitResponse {
    /// Zero-based position in the principal's ledger partition.
    pub index: u64,
    /// Timestamp stored with the record.
    pub timestamp: u64,
}

/// Number of visits recorded for a principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VisitCountResponse {
    pub principal: Principal,
    pub count: u64,
}

/// Encrypted visit snapshot for a principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VisitListResponse {
    pub principal: Principal,
    pub visits: Vec<VisitRecord>,
}

/// Current submission state for the custodied principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SubmissionStatusResponse {
    pub principal: Principal,
    pub state: SubmissionState,
}

/// Decrypted, catalog-labelled visits for the custodied principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DecryptVisitsResponse {
    pub principal: Principal,
    pub visits: Vec<DisclosedVisit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_parses_and_displays_checksummed() {
        let principal: Principal = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
            .parse()
            .unwrap();
        assert_eq!(
            principal.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn principal_rejects_malformed_input() {
        assert!("not-an-address".parse::<Principal>().is_err());
        assert!("0x1234".parse::<Principal>().is_err());
    }

    #[test]
    fn scope_serializes_as_plain_string() {
        let scope: Scope = "0x749b19F59B2264f846cFf9D68bDB098CE63E31aD".parse().unwrap();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(
            json.to_lowercase(),
            r#""0x749b19f59b2264f846cff9d68bdb098ce63e31ad""#
        );

        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }

    #[test]
    fn submit_request_accepts_missing_fields() {
        let request: SubmitVisitRequest = serde_json::from_str(r#"{"country_id": 3}"#).unwrap();
        assert_eq!(request.country_id, Some(3));
        assert_eq!(request.city_id, None);
        assert_eq!(request.timestamp, None);
    }
}
