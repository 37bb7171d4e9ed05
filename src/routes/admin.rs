use crate::{AppState, handlers};
use axum::{Router, routing::delete};

/// Admin Router Module
///
/// Administrative operations outside the rental lifecycle. The caller must layer
/// these routes with `admin_middleware` *inside* `auth_middleware`: the guard only
/// reads the principal that authentication attached.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // DELETE /api/rentals/{id}
        // Remove-by-id; stock counters are left alone.
        .route("/api/rentals/{id}", delete(handlers::delete_rental))
}
