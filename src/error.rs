// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::grants::DecryptionError;
use crate::ledger::LedgerError;
use crate::submission::SubmissionError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(_) | LedgerError::Unavailable(_) => {
                error!(error = %err, "Ledger storage failure");
                ApiError::internal("Ledger storage failure")
            }
            other => ApiError::bad_gateway(other.to_string()),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(message) => ApiError::bad_request(message),
            SubmissionError::InProgress(_) => ApiError::conflict(err.to_string()),
            SubmissionError::Encoding(_) => ApiError::bad_gateway(err.to_string()),
            SubmissionError::Ledger(
                inner @ (LedgerError::Database(_) | LedgerError::Unavailable(_)),
            ) => ApiError::from(inner),
            SubmissionError::Ledger(inner) => {
                ApiError::bad_gateway(format!("Ledger append failed: {inner}"))
            }
            SubmissionError::Timeout => ApiError::gateway_timeout(err.to_string()),
            SubmissionError::Cancelled => ApiError::service_unavailable(err.to_string()),
        }
    }
}

impl From<DecryptionError> for ApiError {
    fn from(err: DecryptionError) -> Self {
        match err {
            DecryptionError::SignatureRejected { .. } | DecryptionError::GrantExpired => {
                ApiError::forbidden(err.to_string())
            }
            DecryptionError::Signer(_) => ApiError::internal(err.to_string()),
            DecryptionError::Ledger(
                inner @ (LedgerError::Database(_) | LedgerError::Unavailable(_)),
            ) => ApiError::from(inner),
            DecryptionError::Decryption(_) | DecryptionError::Ledger(_) => {
                ApiError::bad_gateway(err.to_string())
            }
            DecryptionError::Timeout => ApiError::gateway_timeout(err.to_string()),
            DecryptionError::Cancelled => ApiError::service_unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Principal;
    use alloy::primitives::Address;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let busy = ApiError::conflict("busy");
        assert_eq!(busy.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn submission_errors_map_to_statuses() {
        let cases = [
            (
                SubmissionError::Validation("city_id is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                SubmissionError::InProgress(Principal(Address::ZERO)),
                StatusCode::CONFLICT,
            ),
            (
                SubmissionError::Ledger(LedgerError::ProofReplayed),
                StatusCode::BAD_GATEWAY,
            ),
            (SubmissionError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (SubmissionError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn validation_message_is_passed_through() {
        let api = ApiError::from(SubmissionError::Validation("city_id is required".into()));
        assert_eq!(api.message, "city_id is required");
    }

    #[test]
    fn decryption_errors_map_to_statuses() {
        let rejected = DecryptionError::SignatureRejected {
            expected: Principal(Address::ZERO),
        };
        assert_eq!(ApiError::from(rejected).status, StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(DecryptionError::GrantExpired).status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(DecryptionError::Timeout).status,
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn storage_failures_are_not_leaked() {
        let api = ApiError::from(LedgerError::Unavailable("disk on fire".into()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("disk"));
    }

    #[test]
    fn storage_failures_during_protocols_are_not_leaked() {
        let submit = ApiError::from(SubmissionError::Ledger(LedgerError::Unavailable(
            "disk on fire".into(),
        )));
        assert_eq!(submit.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!submit.message.contains("disk"));

        let decrypt = ApiError::from(DecryptionError::Ledger(LedgerError::Unavailable(
            "disk on fire".into(),
        )));
        assert_eq!(decrypt.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!decrypt.message.contains("disk"));

        let replayed = ApiError::from(DecryptionError::Ledger(LedgerError::ProofReplayed));
        assert_eq!(replayed.status, StatusCode::BAD_GATEWAY);
    }
}
