use crate::config::Config;
use crate::entities::customer::{self, Role};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;

use super::logging::{to_response, ApiError};

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(token) => token.to_owned(),
        None => return unauthorized(AuthMiddlewareError::MissingToken),
    };

    let claims = match validate_token(&state.db, &state.config, &token, state.role).await {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "Rejected token");
            return unauthorized(err);
        }
    };

    req.extensions_mut().insert(claims);
    next.run(req).await
}

fn unauthorized(err: AuthMiddlewareError) -> Response {
    let status = match err {
        AuthMiddlewareError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    };
    to_response(
        (status, Json(json!({ "error": err.to_string() }))).into_response(),
        Err(ApiError::Unauthorized(err.to_string())),
    )
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub customer_id: i32,
    pub role: String,
    pub token_type: TokenType,
    pub exp: usize,
}

impl Claims {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role).ok()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub role: Role,
}

pub fn generate_token(
    config: &Config,
    customer_id: i32,
    role: Role,
    token_type: TokenType,
) -> Result<String, AuthMiddlewareError> {
    let lifetime = match token_type {
        TokenType::Access => Duration::hours(config.access_token_hours),
        TokenType::Refresh => Duration::days(config.refresh_token_days),
    };
    let exp = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        customer_id,
        role: role.as_str().to_owned(),
        token_type,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

/// Checks signature, expiry and token type. Does not touch the database.
pub fn decode_token(
    config: &Config,
    token: &str,
    expected: TokenType,
) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::TokenExpired)?;

    if token_data.claims.token_type != expected {
        return Err(AuthMiddlewareError::WrongTokenType);
    }

    Ok(token_data.claims)
}

pub async fn validate_token(
    db: &DatabaseConnection,
    config: &Config,
    token: &str,
    req_role: Role,
) -> Result<Claims, AuthMiddlewareError> {
    let claims = decode_token(config, token, TokenType::Access)?;

    let model = customer::Entity::find_by_id(claims.customer_id)
        .one(db)
        .await
        .map_err(|_| AuthMiddlewareError::InternalServerError)?
        .ok_or(AuthMiddlewareError::InvalidUserOrRole)?;

    // Flags are read from the row so demoted staff lose access immediately.
    if !model.is_active || !model.role().allows(req_role) {
        return Err(AuthMiddlewareError::InvalidUserOrRole);
    }

    Ok(claims)
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Token expired or invalid")]
    TokenExpired,
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error")]
    InternalServerError,
}
