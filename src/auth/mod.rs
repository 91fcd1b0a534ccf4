/*!
 * # Authentication
 *
 * Bearer tokens are verified by an [`IdentityVerifier`]; the resulting claims
 * carry the caller's email, which is resolved to a local user account.
 *
 * `auth_middleware` rejects requests without a valid token and places
 * [`IdentityClaims`] (and [`CurrentUser`] when the account exists) into the
 * request extensions for handlers to extract.
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::user::Model as UserModel;
use crate::errors::ServiceError;
use crate::AppState;

/// Claims extracted from a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: usize,
}

/// Turns a bearer credential into identity claims.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<IdentityClaims, ServiceError>;
}

/// Verifies HS256-signed JWTs and their expiry.
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityVerifier for JwtIdentityVerifier {
    fn verify(&self, token: &str) -> Result<IdentityClaims, ServiceError> {
        let claims = decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::Unauthorized("Token expired".to_string())
                }
                _ => ServiceError::Unauthorized("Invalid token".to_string()),
            })?
            .claims;

        if claims.email.trim().is_empty() {
            return Err(ServiceError::Unauthorized(
                "Token carries no email claim".to_string(),
            ));
        }
        Ok(claims)
    }
}

/// Local account of the authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserModel);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Requires a valid bearer token on every request it wraps.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
    let claims = state.services.identity.verify(token)?;

    if let Some(user) = state.services.users.find_by_email(&claims.email).await? {
        debug!(user_id = user.id, "Authenticated request");
        request.extensions_mut().insert(CurrentUser(user));
    }
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            ServiceError::Unauthorized("Unknown user; call /api/login first".to_string())
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IdentityClaims
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityClaims>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("Missing identity".to_string()))
    }
}
