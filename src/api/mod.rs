// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    catalog::{City, Country},
    ledger::VisitRecord,
    models::{
        DecryptVisitsResponse, RegistryInfo, SubmissionStatusResponse, SubmitVisitRequest,
        SubmitVisitResponse, VisitCountResponse, VisitListResponse,
    },
    reconcile::{DisclosedLocation, DisclosedVisit},
    state::AppState,
    submission::SubmissionState,
};

pub mod health;
pub mod locations;
pub mod registry;
pub mod visits;

pub fn router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state.clone());

    let v1_routes = Router::new()
        .route("/registry", get(registry::get_registry))
        .route("/locations", get(locations::list_countries))
        .route(
            "/locations/{country_id}/cities",
            get(locations::list_cities),
        )
        .route("/visits", post(visits::submit_visit))
        .route("/visits/submission", get(visits::submission_status))
        .route("/visits/decrypt", post(visits::decrypt_visits))
        .route("/visits/{principal}", get(visits::list_visits))
        .route("/visits/{principal}/count", get(visits::visit_count))
        .route("/visits/{principal}/{index}", get(visits::get_visit))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            // x-request-id is assigned before the trace span opens and echoed on the response
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        registry::get_registry,
        locations::list_countries,
        locations::list_cities,
        visits::submit_visit,
        visits::submission_status,
        visits::decrypt_visits,
        visits::list_visits,
        visits::visit_count,
        visits::get_visit
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            RegistryInfo,
            Country,
            City,
            VisitRecord,
            SubmitVisitRequest,
            SubmitVisitResponse,
            SubmissionState,
            SubmissionStatusResponse,
            VisitCountResponse,
            VisitListResponse,
            DisclosedLocation,
            DisclosedVisit,
            DecryptVisitsResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Registry", description = "Registry identity"),
        (name = "Locations", description = "Country and city catalog"),
        (name = "Visits", description = "Encrypted visit submission and disclosure")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::default());
        let _ = app.into_make_service();
    }

    #[test]
    fn openapi_lists_visit_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/visits"));
        assert!(doc.paths.paths.contains_key("/v1/visits/{principal}/{index}"));
        assert!(doc.paths.paths.contains_key("/health/ready"));
    }
}
