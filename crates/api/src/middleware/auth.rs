//! Request authentication.
//!
//! Members authenticate with a JWT issued by the login service
//! (`Authorization: Bearer <JWT>`). Scheduler hooks under `/api/internal`
//! authenticate with the shared `X-API-Key`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use walwal_common::error::AppError;

use crate::state::AppState;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the member's UUID
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated member extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub member_id: Uuid,
    pub claims: Claims,
}

/// Marker extractor for scheduler-only routes.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

pub fn encode_jwt(member_id: Uuid, secret: &str, expiry_hours: u64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: member_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.jwt_secret.clone();
        let auth_header = header_value(parts, "authorization");

        async move {
            if let Some(auth) = auth_header
                && let Some(token) = auth.strip_prefix("Bearer ")
            {
                let claims = decode_jwt(token, &secret)?;
                let member_id = Uuid::parse_str(&claims.sub)
                    .map_err(|_| AppError::Auth("Invalid member ID in token".to_string()))?;
                return Ok(AuthUser { member_id, claims });
            }

            Err(AppError::Auth(
                "Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let expected = state.config.internal_api_key.clone();
        let presented = header_value(parts, "x-api-key");

        async move {
            match (expected, presented) {
                (Some(expected), Some(presented)) if expected == presented => Ok(InternalCaller),
                (None, _) => Err(AppError::Auth("Internal routes are disabled".to_string())),
                _ => Err(AppError::Auth("Missing or invalid X-API-Key header".to_string())),
            }
        }
    }
}
