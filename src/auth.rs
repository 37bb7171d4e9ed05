use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

/// The designated credential header every mutating request must carry.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Claims
///
/// Payload signed into every identity token.
///
/// No `exp` claim: validity is signature-only and expiry is neither required nor
/// checked. Tokens cannot be revoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the id of the authenticated user.
    pub sub: Uuid,
    /// Role flag; a token without it is treated as a non-admin token.
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    /// Issued At, seconds since the epoch. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Principal
///
/// The identity resolved from a verified token and attached to the request for
/// the later pipeline stages. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Uuid,
    pub is_admin: bool,
}

/// AuthError
///
/// Why a credential was rejected. Kept separate from `ApiError` so the two
/// outcomes (absent vs. unverifiable) stay distinguishable in tests and logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access denied: no token provided")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Authentication(err.to_string()),
            AuthError::InvalidToken(ref source) => {
                tracing::debug!(error = %source, "token rejected");
                ApiError::MalformedCredential(err.to_string())
            }
        }
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// TokenAuthenticator
///
/// Verifies and issues HS256-signed identity tokens with a server-held secret.
/// The secret is passed in explicitly at construction; there is no global key.
#[derive(Clone)]
pub struct TokenAuthenticator {
    keys: Arc<Keys>,
}

impl TokenAuthenticator {
    pub fn new(secret: &str) -> Self {
        // Pinning the algorithm rejects `alg: none` and algorithm-confusion tokens.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
        }
    }

    /// verify
    ///
    /// Turns the raw header value into a `Principal`.
    ///
    /// - absent or empty → `AuthError::MissingToken` (401 at the edge)
    /// - bad signature, bad encoding, bad claims → `AuthError::InvalidToken` (400)
    pub fn verify(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation)
            .map_err(AuthError::InvalidToken)?;

        Ok(Principal {
            subject_id: data.claims.sub,
            is_admin: data.claims.is_admin,
        })
    }

    /// Signs a token for `principal`.
    pub fn issue(&self, principal: &Principal) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: principal.subject_id,
            is_admin: principal.is_admin,
            iat: Some(Utc::now().timestamp()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
    }
}

/// Principal Extractor Implementation
///
/// Lets handlers and middleware take `Principal` as an argument.
///
/// 1. If `auth_middleware` already attached a principal to the request extensions,
///    that one is reused (no second verification).
/// 2. Otherwise the `x-auth-token` header is verified with the `TokenAuthenticator`
///    from the app state.
///
/// Rejection: `ApiError::Authentication` (401) or `ApiError::MalformedCredential` (400).
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    TokenAuthenticator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }

        let authenticator = TokenAuthenticator::from_ref(state);
        let token = match parts.headers.get(AUTH_TOKEN_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| {
                ApiError::MalformedCredential("invalid token".to_string())
            })?),
            None => None,
        };

        Ok(authenticator.verify(token)?)
    }
}

/// auth_middleware
///
/// First stage of every protected pipeline. Extracting `Principal` authenticates the
/// request (rejecting with 401/400 before any handler runs); on success the principal
/// is attached to the request extensions for `admin_middleware` and the handlers.
pub async fn auth_middleware(principal: Principal, mut request: Request, next: Next) -> Response {
    tracing::Span::current().record("subject", tracing::field::display(principal.subject_id));
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// admin_middleware
///
/// The access guard. It does **not** authenticate: it must be layered *inside*
/// `auth_middleware`, which attaches the principal it reads. A missing principal means
/// the pipeline was composed wrongly; the guard then fails closed with 401.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<Principal>() {
        Some(principal) if principal.is_admin => Ok(next.run(request).await),
        Some(principal) => {
            tracing::info!(subject = %principal.subject_id, "admin route denied");
            Err(ApiError::Authorization("Access denied".to_string()))
        }
        None => {
            tracing::error!("admin guard reached without an authenticated principal");
            Err(ApiError::Authentication("access denied: no token provided".to_string()))
        }
    }
}
