//! Request authentication middleware
//!
//! Extracts and validates bearer tokens from the `Authorization` header and attaches an
//! [`Identity`] to the request. Role checks are a separate layer stacked behind it.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::jwt::TokenIssuer;
use super::models::{Identity, Role};
use crate::{PassgateError, Result};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the raw token from `Authorization: Bearer <token>`
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        PassgateError::Unauthorized("No authorization token provided".to_string())
    })?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            PassgateError::Unauthorized("Invalid authorization header format".to_string())
        })
}

/// Validate the access token in `headers` and map its claims to an identity
pub fn authenticate(tokens: &TokenIssuer, headers: &HeaderMap) -> Result<Identity> {
    let token = extract_bearer(headers)?;
    let claims = tokens
        .verify_access(token)
        .map_err(|e| PassgateError::Unauthorized(e.to_string()))?;

    match claims.role {
        Some(role) => Ok(Identity {
            user_id: claims.sub,
            role,
        }),
        None => Err(PassgateError::Unauthorized("Token carries no role".to_string())),
    }
}

/// axum middleware: rejects unauthenticated requests, otherwise stores the identity in
/// request extensions
pub async fn require_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let identity = authenticate(&tokens, request.headers())?;
    log::debug!("Authenticated user {} ({})", identity.user_id, identity.role);
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Passes when no role is required; otherwise the identity must hold one of `required`
pub fn authorize(required: &[Role], identity: Option<&Identity>) -> Result<()> {
    if required.is_empty() {
        return Ok(());
    }
    match identity {
        Some(identity) if required.contains(&identity.role) => Ok(()),
        _ => Err(PassgateError::Forbidden(
            "Insufficient permissions".to_string(),
        )),
    }
}

/// Roles accepted by a route, fixed when the router is built
#[derive(Debug, Clone)]
pub struct RequiredRoles(Arc<[Role]>);

impl RequiredRoles {
    pub fn new(roles: &[Role]) -> Self {
        Self(Arc::from(roles))
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

/// axum middleware: role check, to be layered after [`require_auth`]
pub async fn require_roles(
    State(required): State<RequiredRoles>,
    request: Request,
    next: Next,
) -> Result<Response> {
    authorize(required.roles(), request.extensions().get::<Identity>())?;
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = PassgateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| PassgateError::Unauthorized("Not authenticated".to_string()))
    }
}
