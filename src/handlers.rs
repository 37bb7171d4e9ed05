use crate::{
    AppState,
    auth::Principal,
    error::ApiError,
    models::{ErrorResponse, RentalRecord, RentalRequest},
    reference::{ValidId, parse_reference},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use uuid::Uuid;

impl RentalRequest {
    /// validate
    ///
    /// Both ids must be present and well-formed store keys. Unlike path ids, a bad
    /// body id is a 400: the client sent an invalid request, not a missing reference.
    pub fn validate(&self) -> Result<(Uuid, Uuid), ApiError> {
        let customer_id = required_id(self.customer_id.as_deref(), "customerId")?;
        let movie_id = required_id(self.movie_id.as_deref(), "movieId")?;
        Ok((customer_id, movie_id))
    }
}

fn required_id(raw: Option<&str>, field: &str) -> Result<Uuid, ApiError> {
    match raw {
        None | Some("") => Err(ApiError::Validation(format!("\"{field}\" is required"))),
        Some(raw) => parse_reference(raw)
            .ok_or_else(|| ApiError::Validation(format!("\"{field}\" must be a valid id"))),
    }
}

fn rental_request(payload: Result<Json<RentalRequest>, JsonRejection>) -> Result<(Uuid, Uuid), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    request.validate()
}

// --- Handlers ---

/// checkout
///
/// [Authenticated Route] Opens a rental and takes one copy of the movie off the shelf.
#[utoipa::path(
    post,
    path = "/api/rentals",
    request_body = RentalRequest,
    responses(
        (status = 200, description = "Rental created", body = RentalRecord),
        (status = 400, description = "Invalid ids, invalid token, or movie not in stock", body = ErrorResponse),
        (status = 401, description = "No token provided", body = ErrorResponse),
        (status = 404, description = "Customer or movie not found", body = ErrorResponse)
    ),
    params(("x-auth-token" = String, Header, description = "Signed identity token"))
)]
pub async fn checkout(
    Principal { subject_id, .. }: Principal,
    State(state): State<AppState>,
    payload: Result<Json<RentalRequest>, JsonRejection>,
) -> Result<Json<RentalRecord>, ApiError> {
    let (customer_id, movie_id) = rental_request(payload)?;
    tracing::debug!(%subject_id, %customer_id, %movie_id, "checkout requested");

    let rental = state.ledger.checkout(customer_id, movie_id).await?;
    Ok(Json(rental))
}

/// process_return
///
/// [Authenticated Route] Closes the rental for a customer/movie pair, computes the
/// fee and puts the copy back in stock. The response carries the full summary
/// (checkout/return times, fee, both snapshots).
#[utoipa::path(
    post,
    path = "/api/returns",
    request_body = RentalRequest,
    responses(
        (status = 200, description = "Rental returned", body = RentalRecord),
        (status = 400, description = "Invalid ids, invalid token, or rental already processed", body = ErrorResponse),
        (status = 401, description = "No token provided", body = ErrorResponse),
        (status = 404, description = "No rental for customer and movie", body = ErrorResponse)
    ),
    params(("x-auth-token" = String, Header, description = "Signed identity token"))
)]
pub async fn process_return(
    Principal { subject_id, .. }: Principal,
    State(state): State<AppState>,
    payload: Result<Json<RentalRequest>, JsonRejection>,
) -> Result<Json<RentalRecord>, ApiError> {
    let (customer_id, movie_id) = rental_request(payload)?;
    tracing::debug!(%subject_id, %customer_id, %movie_id, "return requested");

    let rental = state.ledger.return_processing(customer_id, movie_id).await?;
    Ok(Json(rental))
}

/// list_rentals
///
/// [Authenticated Route] All rentals, newest checkout first.
#[utoipa::path(
    get,
    path = "/api/rentals",
    responses(
        (status = 200, description = "Rentals", body = [RentalRecord]),
        (status = 401, description = "No token provided", body = ErrorResponse)
    ),
    params(("x-auth-token" = String, Header, description = "Signed identity token"))
)]
pub async fn list_rentals(State(state): State<AppState>) -> Result<Json<Vec<RentalRecord>>, ApiError> {
    Ok(Json(state.repo.list_rentals().await?))
}

/// get_rental
///
/// [Authenticated Route] A single rental. Malformed and unknown ids both give 404.
#[utoipa::path(
    get,
    path = "/api/rentals/{id}",
    params(
        ("id" = String, Path, description = "Rental id"),
        ("x-auth-token" = String, Header, description = "Signed identity token")
    ),
    responses(
        (status = 200, description = "Found", body = RentalRecord),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    ValidId(id): ValidId,
) -> Result<Json<RentalRecord>, ApiError> {
    state
        .repo
        .get_rental(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Rental does not exist".to_string()))
}

/// delete_rental
///
/// [Admin Route] Removes a rental record by id and returns it. Stock is not adjusted.
#[utoipa::path(
    delete,
    path = "/api/rentals/{id}",
    params(
        ("id" = String, Path, description = "Rental id"),
        ("x-auth-token" = String, Header, description = "Signed identity token of an admin")
    ),
    responses(
        (status = 200, description = "Deleted", body = RentalRecord),
        (status = 401, description = "No token provided", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_rental(
    Principal { subject_id, .. }: Principal,
    State(state): State<AppState>,
    ValidId(id): ValidId,
) -> Result<Json<RentalRecord>, ApiError> {
    let rental = state
        .repo
        .delete_rental(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Rental not in database".to_string()))?;

    tracing::info!(rental_id = %rental.id, %subject_id, "rental deleted by admin");
    Ok(Json(rental))
}
