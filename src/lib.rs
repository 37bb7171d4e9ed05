use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request pipeline stages.
pub mod auth;
pub mod reference;

// Rental lifecycle and its persistence.
pub mod ledger;
pub mod memory;
pub mod models;
pub mod repository;

// HTTP surface and configuration.
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use auth::{admin_middleware, auth_middleware};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{Principal, TokenAuthenticator};
pub use config::AppConfig;
pub use ledger::RentalLedger;
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the rental endpoints, served at `/api-docs/openapi.json`
/// and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::checkout, handlers::process_return, handlers::list_rentals,
        handlers::get_rental, handlers::delete_rental
    ),
    components(
        schemas(
            models::RentalRecord, models::CustomerSnapshot, models::MovieSnapshot,
            models::RentalRequest, models::ErrorResponse,
        )
    ),
    tags(
        (name = "movie-rentals", description = "Movie rental checkout and return API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services every request needs. Each piece is
/// built explicitly in `main` (or a test) from `AppConfig` and handed in here.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory for local runs and tests.
    pub repo: RepositoryState,
    /// Checkout/return state machine over `repo`.
    pub ledger: RentalLedger,
    /// Verifies (and issues) identity tokens with the configured secret.
    pub auth: TokenAuthenticator,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the ledger and authenticator from a store handle and the configuration.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            ledger: RentalLedger::new(repo.clone()),
            auth: TokenAuthenticator::new(&config.jwt_secret),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for RentalLedger {
    fn from_ref(app_state: &AppState) -> RentalLedger {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for TokenAuthenticator {
    fn from_ref(app_state: &AppState) -> TokenAuthenticator {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree and its pipelines:
///
/// - public: no stages
/// - authenticated: `auth_middleware` → handler (reference/body validation inside)
/// - admin: `auth_middleware` → `admin_middleware` → handler
///
/// `route_layer` wraps what is already there, so the layer added *last* runs *first*.
/// For the admin routes the guard is therefore added before the authenticator; swapping
/// the two calls would run the guard with no principal attached.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            admin::admin_routes()
                // Inner: the guard reads the principal attached by the authenticator.
                .route_layer(middleware::from_fn(admin_middleware))
                // Outer: runs first and attaches the principal.
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, correlated by `x-request-id`. `subject` is filled in by
/// `auth_middleware` once the caller is known.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
        subject = tracing::field::Empty,
    )
}
