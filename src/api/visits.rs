// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiError,
    ledger::VisitRecord,
    models::{
        DecryptVisitsResponse, Principal, SubmissionStatusResponse, SubmitVisitRequest,
        SubmitVisitResponse, VisitCountResponse, VisitListResponse,
    },
    signer::PrincipalSigner,
    state::AppState,
    submission::VisitDraft,
    util::unix_now,
};

#[utoipa::path(
    get,
    path = "/v1/visits/{principal}",
    params(
        ("principal" = String, Path, description = "Account address owning the partition")
    ),
    tag = "Visits",
    responses((status = 200, body = VisitListResponse))
)]
pub async fn list_visits(
    Path(principal): Path<Principal>,
    State(state): State<AppState>,
) -> Result<Json<VisitListResponse>, ApiError> {
    let visits = state.service.list_visits(principal).await?;
    Ok(Json(VisitListResponse { principal, visits }))
}

#[utoipa::path(
    get,
    path = "/v1/visits/{principal}/count",
    params(
        ("principal" = String, Path, description = "Account address owning the partition")
    ),
    tag = "Visits",
    responses((status = 200, body = VisitCountResponse))
)]
pub async fn visit_count(
    Path(principal): Path<Principal>,
    State(state): State<AppState>,
) -> Result<Json<VisitCountResponse>, ApiError> {
    let count = state.service.visit_count(principal).await?;
    Ok(Json(VisitCountResponse { principal, count }))
}

#[utoipa::path(
    get,
    path = "/v1/visits/{principal}/{index}",
    params(
        ("principal" = String, Path, description = "Account address owning the partition"),
        ("index" = u64, Path, description = "Zero-based record index")
    ),
    tag = "Visits",
    responses(
        (status = 200, body = VisitRecord),
        (status = 404, description = "No record at this index")
    )
)]
pub async fn get_visit(
    Path((principal, index)): Path<(Principal, u64)>,
    State(state): State<AppState>,
) -> Result<Json<VisitRecord>, ApiError> {
    state
        .service
        .visit(principal, index)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Visit {index} of {principal} not found")))
}

/// Encrypt and record a visit for the custodied principal.
#[utoipa::path(
    post,
    path = "/v1/visits",
    request_body = SubmitVisitRequest,
    tag = "Visits",
    responses(
        (status = 201, body = SubmitVisitResponse),
        (status = 400, description = "Country or city not selected"),
        (status = 409, description = "A submission is already in flight"),
        (status = 502, description = "Encoding or ledger append failed")
    )
)]
pub async fn submit_visit(
    State(state): State<AppState>,
    Json(request): Json<SubmitVisitRequest>,
) -> Result<(StatusCode, Json<SubmitVisitResponse>), ApiError> {
    let draft = VisitDraft {
        country_id: request.country_id,
        city_id: request.city_id,
        timestamp: request.timestamp.unwrap_or_else(unix_now),
    };
    let cancel = state.shutdown.child_token();

    let receipt = state
        .service
        .submit_visit(state.signer.principal(), draft, &cancel)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitVisitResponse {
            index: receipt.index,
            timestamp: receipt.timestamp,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/visits/submission",
    tag = "Visits",
    responses((status = 200, body = SubmissionStatusResponse))
)]
pub async fn submission_status(State(state): State<AppState>) -> Json<SubmissionStatusResponse> {
    let principal = state.signer.principal();
    Json(SubmissionStatusResponse {
        principal,
        state: state.service.submission_state(principal),
    })
}

/// Authorize and decrypt every visit of the custodied principal in one session.
#[utoipa::path(
    post,
    path = "/v1/visits/decrypt",
    tag = "Visits",
    responses(
        (status = 200, body = DecryptVisitsResponse),
        (status = 403, description = "Grant signature rejected or expired"),
        (status = 502, description = "Decryption service failed")
    )
)]
pub async fn decrypt_visits(
    State(state): State<AppState>,
) -> Result<Json<DecryptVisitsResponse>, ApiError> {
    let cancel = state.shutdown.child_token();
    let visits = state
        .service
        .decrypt_visits(state.signer.as_ref(), &cancel)
        .await?;

    Ok(Json(DecryptVisitsResponse {
        principal: state.signer.principal(),
        visits,
    }))
}
