use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::ApiError;

/// Parses a store key: a UUID in hyphenated (36 chars) or simple (32 hex chars) form.
/// Braced and URN forms are rejected even though `Uuid` itself would accept them.
pub fn parse_reference(raw: &str) -> Option<Uuid> {
    match raw.len() {
        32 | 36 => Uuid::try_parse(raw).ok(),
        _ => None,
    }
}

/// ValidId
///
/// Path extractor for the `{id}` segment of entity routes. Identifiers that are not
/// well-formed keys are rejected with **404**, the same outcome as a missing record,
/// so clients cannot tell the two apart.
///
/// Runs inside the handler, after every middleware layer on the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidId(pub Uuid);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| not_found())?;

        parse_reference(&raw).map(ValidId).ok_or_else(|| {
            tracing::debug!(id = %raw, "rejected malformed reference");
            not_found()
        })
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("The record with the given id was not found".to_string())
}
