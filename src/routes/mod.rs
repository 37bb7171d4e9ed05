/// Router Module Index
///
/// Routes are split by the pipeline they run behind. The layers themselves are
/// applied in `create_router`, so the composition order is visible in one place.

/// Routes accessible to anyone (health check).
pub mod public;

/// Routes behind the token authenticator.
pub mod authenticated;

/// Routes behind the token authenticator *and* the admin guard.
pub mod admin;
