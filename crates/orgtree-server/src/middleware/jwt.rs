//! JWT authentication middleware.
//!
//! Decodes HS256 claims into a [`Principal`] and attaches it as a request
//! extension; core logic never reads raw tokens. Session management and
//! the identity provider are external collaborators.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use orgtree_core::principal::{JwtClaims, Principal};
use orgtree_core::OrgtreeError;

use crate::error::AppError;

#[derive(Clone)]
pub struct JwtConfig {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| OrgtreeError::Forbidden("missing bearer token".into()))?;

    let data = decode::<JwtClaims>(token, &config.decoding, &config.validation)
        .map_err(|e| OrgtreeError::Forbidden(format!("invalid token: {e}")))?;
    let principal = Principal::from_jwt_claims(&data.claims)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
