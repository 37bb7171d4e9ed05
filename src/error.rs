use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{ledger::LedgerError, models::ErrorResponse, repository::StoreError};

/// ApiError
///
/// The client-facing error taxonomy. Every handler and extractor in the pipeline
/// rejects with this type, so all error responses share the same status mapping
/// and the same `{code, message}` JSON body.
///
/// `Internal` never carries detail to the client; the cause is logged where the
/// error is built.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request input (400).
    #[error("{0}")]
    Validation(String),
    /// Missing credential (401).
    #[error("{0}")]
    Authentication(String),
    /// A credential was supplied but could not be verified or decoded (400).
    #[error("{0}")]
    MalformedCredential(String),
    /// Authenticated, but the role is insufficient (403).
    #[error("{0}")]
    Authorization(String),
    /// Missing entity, or an identifier that is not a well-formed key (404).
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    OutOfStock(String),
    #[error("{0}")]
    AlreadyProcessed(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::MalformedCredential(_)
            | ApiError::OutOfStock(_)
            | ApiError::AlreadyProcessed(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code used in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Authentication(_) => "unauthorized",
            ApiError::MalformedCredential(_) => "invalid_token",
            ApiError::Authorization(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::OutOfStock(_) => "out_of_stock",
            ApiError::AlreadyProcessed(_) => "already_processed",
            ApiError::Internal => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Store faults that reach the HTTP edge directly (reads, admin deletes) are
/// logged here and reported as a generic 500.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = ?err, "rental store failure");
        ApiError::Internal
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::MovieNotFound => ApiError::NotFound("Movie does not exist".into()),
            LedgerError::CustomerNotFound => ApiError::NotFound("Customer does not exist".into()),
            LedgerError::RentalNotFound => {
                ApiError::NotFound("No rental found for this customer and movie".into())
            }
            LedgerError::OutOfStock => ApiError::OutOfStock("Movie not in stock".into()),
            LedgerError::AlreadyProcessed => {
                ApiError::AlreadyProcessed("Rental has already been processed".into())
            }
            LedgerError::Store(store) => store.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Authentication("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MalformedCredential("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Authorization("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::OutOfStock("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::AlreadyProcessed("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn ledger_errors_map_to_client_outcomes() {
        let out_of_stock: ApiError = LedgerError::OutOfStock.into();
        assert_eq!(out_of_stock.code(), "out_of_stock");

        let processed: ApiError = LedgerError::AlreadyProcessed.into();
        assert_eq!(processed.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = LedgerError::CustomerNotFound.into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_hide_store_detail() {
        let err: ApiError = StoreError::Unavailable("connection reset by peer".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("connection reset"));
    }
}
