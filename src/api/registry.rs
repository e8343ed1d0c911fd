// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{models::RegistryInfo, signer::PrincipalSigner, state::AppState};

#[utoipa::path(
    get,
    path = "/v1/registry",
    tag = "Registry",
    responses((status = 200, body = RegistryInfo))
)]
pub async fn get_registry(State(state): State<AppState>) -> Json<RegistryInfo> {
    Json(RegistryInfo {
        scope: state.service.scope(),
        principal: state.signer.principal(),
        chain_id: state.chain_id,
        ledger: state.service.ledger().kind().to_string(),
    })
}
