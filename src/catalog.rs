// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static location catalog.
//!
//! Bidirectional lookup between numeric place identifiers and display names.
//! Countries and cities live in separate id namespaces; city ids are
//! `country_id * 100 + n` by convention but are never parsed that way.
//!
//! Unknown ids are legal in the ledger (plaintext is never validated
//! server-side) and render as `Country #<id>` / `City #<id>`.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;
use utoipa::ToSchema;

/// Numeric place identifier, encrypted as a `uint32`.
pub type LocationId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct City {
    pub id: LocationId,
    #[schema(value_type = String)]
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Country {
    pub id: LocationId,
    #[schema(value_type = String)]
    pub name: &'static str,
    #[schema(value_type = Vec<City>)]
    pub cities: &'static [City],
}

/// Which id namespace a label is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Country,
    City,
}

impl LocationKind {
    /// Generic label for an id missing from the catalog.
    pub fn fallback_label(self, id: u64) -> String {
        format!("{self} #{id}")
    }
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationKind::Country => write!(f, "Country"),
            LocationKind::City => write!(f, "City"),
        }
    }
}

const fn city(id: LocationId, name: &'static str) -> City {
    City { id, name }
}

pub const COUNTRIES: &[Country] = &[
    Country {
        id: 1,
        name: "United States",
        cities: &[
            city(101, "New York"),
            city(102, "San Francisco"),
            city(103, "Los Angeles"),
            city(104, "Chicago"),
        ],
    },
    Country {
        id: 2,
        name: "China",
        cities: &[
            city(201, "Beijing"),
            city(202, "Shanghai"),
            city(203, "Shenzhen"),
            city(204, "Guangzhou"),
        ],
    },
    Country {
        id: 3,
        name: "United Kingdom",
        cities: &[
            city(301, "London"),
            city(302, "Manchester"),
            city(303, "Edinburgh"),
            city(304, "Birmingham"),
        ],
    },
    Country {
        id: 4,
        name: "Germany",
        cities: &[
            city(401, "Berlin"),
            city(402, "Munich"),
            city(403, "Hamburg"),
            city(404, "Frankfurt"),
        ],
    },
    Country {
        id: 5,
        name: "Japan",
        cities: &[
            city(501, "Tokyo"),
            city(502, "Osaka"),
            city(503, "Kyoto"),
            city(504, "Sapporo"),
        ],
    },
    Country {
        id: 6,
        name: "Australia",
        cities: &[
            city(601, "Sydney"),
            city(602, "Melbourne"),
            city(603, "Brisbane"),
            city(604, "Perth"),
        ],
    },
];

static STANDARD: LazyLock<LocationCatalog> = LazyLock::new(|| LocationCatalog::new(COUNTRIES));

/// Read-only catalog, safe to share across any number of tasks.
#[derive(Debug)]
pub struct LocationCatalog {
    countries: &'static [Country],
    country_names: HashMap<LocationId, &'static str>,
    city_names: HashMap<LocationId, &'static str>,
}

impl LocationCatalog {
    pub fn new(countries: &'static [Country]) -> Self {
        let mut country_names = HashMap::new();
        let mut city_names = HashMap::new();
        for country in countries {
            country_names.insert(country.id, country.name);
            for city in country.cities {
                city_names.insert(city.id, city.name);
            }
        }
        Self {
            countries,
            country_names,
            city_names,
        }
    }

    /// The built-in catalog.
    pub fn standard() -> &'static LocationCatalog {
        &STANDARD
    }

    pub fn countries(&self) -> &'static [Country] {
        self.countries
    }

    /// Cities of a country; empty for an unknown country.
    pub fn cities_for_country(&self, country_id: LocationId) -> &'static [City] {
        self.countries
            .iter()
            .find(|country| country.id == country_id)
            .map(|country| country.cities)
            .unwrap_or(&[])
    }

    pub fn country_name(&self, id: LocationId) -> Option<&'static str> {
        self.country_names.get(&id).copied()
    }

    pub fn city_name(&self, id: LocationId) -> Option<&'static str> {
        self.city_names.get(&id).copied()
    }

    /// Display label for a decrypted id, falling back to `<Kind> #<id>`.
    pub fn label(&self, kind: LocationKind, id: u64) -> String {
        let name = LocationId::try_from(id).ok().and_then(|id| match kind {
            LocationKind::Country => self.country_name(id),
            LocationKind::City => self.city_name(id),
        });
        match name {
            Some(name) => name.to_string(),
            None => kind.fallback_label(id),
        }
    }

    pub fn country_label(&self, id: u64) -> String {
        self.label(LocationKind::Country, id)
    }

    pub fn city_label(&self, id: u64) -> String {
        self.label(LocationKind::City, id)
    }
}
