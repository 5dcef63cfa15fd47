use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Response,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::entities::customer::Role;
use crate::middleware::auth::{bearer_token, validate_token, AuthMiddlewareError};
use crate::middleware::logging::{ApiError, HandlerError};

pub const CART_COOKIE: &str = "cart_session";

/// Who owns the cart of the current request.
///
/// A valid access token of an active account selects the customer's cart; otherwise the
/// `cart_session` cookie names an anonymous one, and a new id is minted
/// when the cookie is absent.
#[derive(Clone, Debug)]
pub struct CartSession {
    pub key: String,
    pub customer_id: Option<i32>,
    issued: Option<Uuid>,
}

impl CartSession {
    pub fn for_customer(customer_id: i32) -> CartSession {
        CartSession {
            key: customer_key(customer_id),
            customer_id: Some(customer_id),
            issued: None,
        }
    }

    /// Adds `Set-Cookie` when this request started a new anonymous session.
    pub fn attach_cookie(&self, mut response: Response) -> Response {
        if let Some(id) = self.issued {
            let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", CART_COOKIE, id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

pub fn customer_key(customer_id: i32) -> String {
    format!("customer:{}", customer_id)
}

pub fn session_key(id: Uuid) -> String {
    format!("session:{}", id)
}

/// Anonymous session id from the request cookies, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CART_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            let config = parts
                .extensions
                .get::<Arc<Config>>()
                .ok_or_else(|| {
                    HandlerError::internal(ApiError::General("Config extension missing".into()))
                })?;
            let db = parts
                .extensions
                .get::<Arc<DatabaseConnection>>()
                .ok_or_else(|| {
                    HandlerError::internal(ApiError::General("Database extension missing".into()))
                })?;
            let claims = validate_token(db, config, token, Role::Customer)
                .await
                .map_err(|err| match err {
                    AuthMiddlewareError::InternalServerError => {
                        HandlerError::internal(ApiError::General(err.to_string()))
                    }
                    err => HandlerError::unauthorized(err.to_string()),
                })?;
            return Ok(CartSession::for_customer(claims.customer_id));
        }

        Ok(match session_cookie(&parts.headers) {
            Some(id) => CartSession {
                key: session_key(id),
                customer_id: None,
                issued: None,
            },
            None => {
                let id = Uuid::new_v4();
                CartSession {
                    key: session_key(id),
                    customer_id: None,
                    issued: Some(id),
                }
            }
        })
    }
}
