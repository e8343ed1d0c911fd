// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    catalog::{City, Country, LocationId},
    error::ApiError,
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/locations",
    tag = "Locations",
    responses((status = 200, body = [Country]))
)]
pub async fn list_countries(State(state): State<AppState>) -> Json<Vec<Country>> {
    Json(state.service.catalog().countries().to_vec())
}

#[utoipa::path(
    get,
    path = "/v1/locations/{country_id}/cities",
    params(
        ("country_id" = u32, Path, description = "Catalog identifier of the country")
    ),
    tag = "Locations",
    responses(
        (status = 200, body = [City]),
        (status = 404, description = "Country not in the catalog")
    )
)]
pub async fn list_cities(
    Path(country_id): Path<LocationId>,
    State(state): State<AppState>,
) -> Result<Json<Vec<City>>, ApiError> {
    let catalog = state.service.catalog();
    if catalog.country_name(country_id).is_none() {
        return Err(ApiError::not_found(format!("Country {country_id} not found")));
    }
    Ok(Json(catalog.cities_for_country(country_id).to_vec()))
}
