use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here must be layered with `auth_middleware` by the caller; handlers
/// rely on a verified `Principal` already sitting in the request extensions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /api/rentals
        // List all rentals, or check a movie out to a customer.
        .route(
            "/api/rentals",
            get(handlers::list_rentals).post(handlers::checkout),
        )
        // GET /api/rentals/{id}
        // Single rental; the id is reference-validated inside the handler.
        .route("/api/rentals/{id}", get(handlers::get_rental))
        // POST /api/returns
        // Close the rental for a customer/movie pair and compute its fee.
        .route("/api/returns", post(handlers::process_return))
}
