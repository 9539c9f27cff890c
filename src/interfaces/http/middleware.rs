//! Identity middleware for Axum
//!
//! Verifies the bearer token and attaches the caller as [`CurrentUser`].
//! Browsers cannot set headers on a WebSocket handshake, so the token is
//! also accepted as an `access_token` query parameter.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::common::ApiError;
use crate::domain::DomainError;
use crate::infrastructure::crypto::jwt::{verify_token, JwtConfig};

/// Authentication state
#[derive(Clone)]
pub struct AuthState {
    pub jwt_config: JwtConfig,
}

/// The authenticated caller. `user_id` is the token's `sub` claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError(DomainError::Unauthorized("authentication required".into())))
    }
}

fn bearer_token(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return value.strip_prefix("Bearer ").map(|t| t.trim().to_string());
    }

    request.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "access_token")
            .map(|(_, value)| value.to_string())
    })
}

/// JWT authentication middleware
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return unauthorized("Missing authentication token");
    };

    match verify_token(&token, &auth_state.jwt_config) {
        Ok(claims) if !claims.sub.trim().is_empty() => {
            request.extensions_mut().insert(CurrentUser {
                user_id: claims.sub,
            });
            next.run(request).await
        }
        Ok(_) => unauthorized("Token has no subject"),
        Err(e) => {
            debug!(error = %e, "Rejected token");
            unauthorized("Invalid or expired authentication token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError(DomainError::Unauthorized(message.to_string())).into_response()
}
