// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maps decrypted identifiers back to catalog labels.
//!
//! A handle missing from the decryption output stays undisclosed and is shown
//! as [`UNDISCLOSED`], so it can never be mistaken for a decrypted id `0`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::{LocationCatalog, LocationKind};
use crate::coprocessor::{CiphertextHandle, DecryptedValues};
use crate::ledger::VisitRecord;

/// Label of a location whose plaintext was not revealed.
pub const UNDISCLOSED: &str = "***";

/// One side (country or city) of a reconciled visit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DisclosedLocation {
    /// Decrypted identifier; absent when undisclosed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Catalog name, `<Kind> #<id>` fallback, or `***`.
    pub label: String,
}

impl DisclosedLocation {
    pub fn undisclosed() -> Self {
        Self {
            id: None,
            label: UNDISCLOSED.to_string(),
        }
    }

    pub fn is_disclosed(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DisclosedVisit {
    pub index: u64,
    pub country: DisclosedLocation,
    pub city: DisclosedLocation,
    pub timestamp: u64,
}

fn disclose(
    catalog: &LocationCatalog,
    kind: LocationKind,
    handle: &CiphertextHandle,
    values: &DecryptedValues,
) -> DisclosedLocation {
    match values.get(handle) {
        Some(id) => DisclosedLocation {
            id: Some(id),
            label: catalog.label(kind, id),
        },
        None => DisclosedLocation::undisclosed(),
    }
}

/// Label every record in ledger order; no reordering or deduplication.
pub fn reconcile(
    catalog: &LocationCatalog,
    records: &[VisitRecord],
    values: &DecryptedValues,
) -> Vec<DisclosedVisit> {
    records
        .iter()
        .map(|record| DisclosedVisit {
            index: record.index,
            country: disclose(catalog, LocationKind::Country, &record.country_handle, values),
            city: disclose(catalog, LocationKind::City, &record.city_handle, values),
            timestamp: record.timestamp,
        })
        .collect()
}
