use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Resolve the authenticated caller's user id from the request headers.
///
/// Accepts `Authorization: Bearer <jwt>` (HS256, `sub` = user id). Outside
/// production an `x-user-id` header may stand in for a token when dev
/// overrides are enabled.
pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> AppResult<Uuid> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
            return Uuid::parse_str(raw.trim()).map_err(|_| {
                AppError::Unauthorized("Unauthorized: invalid x-user-id override.".to_string())
            });
        }
    }

    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
        })?;

    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: token verification is not configured.".to_string())
    })?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "JWT validation failed");
        AppError::Unauthorized("Unauthorized: invalid token.".to_string())
    })?;

    Uuid::parse_str(decoded.claims.sub.trim())
        .map_err(|_| AppError::Unauthorized("Unauthorized: invalid subject claim.".to_string()))
}
