use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::entities::{
    customer::{self, hash_password, normalize_email, Entity as CustomerEntity},
    password_reset,
};
use crate::middleware::{
    auth::{decode_token, generate_token, validate_token, TokenType},
    cart_session::{customer_key, session_cookie, session_key},
    logging::{message, ok, ApiError, HandlerError, HandlerResult},
};
use crate::shop::cart;

pub fn auth_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/refresh", post(refresh))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
}

async fn register(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterPayload>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let password = hash_password(&payload.password).map_err(|err| {
        HandlerError::internal(ApiError::PasswordHashFailed(err.to_string()))
    })?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let new_customer = customer::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        email: Set(normalize_email(&payload.email)),
        phone: Set(payload.phone.filter(|phone| !phone.trim().is_empty())),
        password: Set(password),
        registered_at: Set(Utc::now()),
        is_active: Set(true),
        is_staff: Set(false),
        is_superuser: Set(false),
        ..Default::default()
    };

    let model = new_customer
        .insert(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Email already registered", err))?;
    txn.commit().await?;

    Ok(ok((StatusCode::CREATED, Json(CustomerResponse::new(model)))))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = CustomerEntity::find()
        .filter(customer::Column::Email.eq(normalize_email(&payload.email)))
        .one(&txn)
        .await?
        .filter(|model| model.is_active)
        .ok_or_else(|| HandlerError::unauthorized("Invalid credentials"))?;

    model
        .check_hash(&payload.password)
        .map_err(|_| HandlerError::unauthorized("Invalid credentials"))?;

    let token = |kind| {
        generate_token(&config, model.id, model.role(), kind).map_err(|err| {
            HandlerError::internal(ApiError::TokenGenerationFailed(err.to_string()))
        })
    };
    let access = token(TokenType::Access)?;
    let refresh = token(TokenType::Refresh)?;

    // A cart filled before logging in follows the customer.
    if let Some(session) = session_cookie(&headers) {
        let merged = cart::merge_into(&txn, &session_key(session), &customer_key(model.id)).await?;
        if merged > 0 {
            info!(customer_id = model.id, merged, "Merged session cart");
        }
    }
    txn.commit().await?;

    Ok(ok(Json(json!({
        "access": access,
        "refresh": refresh,
        "customer": CustomerResponse::new(model),
    }))))
}

async fn verify(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Json(payload): Json<VerifyPayload>,
) -> HandlerResult {
    let claims = validate_token(&db, &config, &payload.token, customer::Role::Customer)
        .await
        .map_err(|err| HandlerError::unauthorized(err.to_string()))?;

    Ok(ok(Json(json!({
        "valid": true,
        "customer_id": claims.customer_id,
        "role": claims.role,
        "exp": claims.exp,
    }))))
}

async fn refresh(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Json(payload): Json<RefreshPayload>,
) -> HandlerResult {
    let claims = decode_token(&config, &payload.refresh, TokenType::Refresh)
        .map_err(|err| HandlerError::unauthorized(err.to_string()))?;

    let model = CustomerEntity::find_by_id(claims.customer_id)
        .one(&*db)
        .await?
        .filter(|model| model.is_active)
        .ok_or_else(|| HandlerError::unauthorized("Invalid user id or role"))?;

    let access = generate_token(&config, model.id, model.role(), TokenType::Access)
        .map_err(|err| HandlerError::internal(ApiError::TokenGenerationFailed(err.to_string())))?;

    Ok(ok(Json(json!({ "access": access }))))
}

async fn request_password_reset(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Json(payload): Json<PasswordResetPayload>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = CustomerEntity::find()
        .filter(customer::Column::Email.eq(normalize_email(&payload.email)))
        .filter(customer::Column::IsActive.eq(true))
        .one(&txn)
        .await?;

    if let Some(model) = found {
        let token = Uuid::new_v4().simple().to_string();
        let reset = password_reset::ActiveModel {
            customer_id: Set(model.id),
            token: Set(token.clone()),
            expires_at: Set(Utc::now() + Duration::minutes(config.password_reset_minutes)),
            used: Set(false),
            ..Default::default()
        };
        password_reset::Entity::insert(reset).exec(&txn).await?;
        // Delivery is left to the mail relay watching this log stream.
        info!(
            customer_id = model.id,
            link = %format!("/auth/resetear-contrasena/{}", token),
            "Password reset requested"
        );
    }
    txn.commit().await?;

    // Same answer whether or not the address exists.
    Ok(message(
        StatusCode::OK,
        "If the address is registered, a reset link has been sent",
    ))
}

async fn confirm_password_reset(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PasswordResetConfirm>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let reset = password_reset::Entity::find()
        .filter(password_reset::Column::Token.eq(&payload.token))
        .one(&txn)
        .await?
        .filter(|reset| reset.is_usable_at(Utc::now()))
        .ok_or_else(|| HandlerError::bad_request("Invalid or expired reset token"))?;

    let model = CustomerEntity::find_by_id(reset.customer_id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::bad_request("Invalid or expired reset token"))?;

    let password = hash_password(&payload.password).map_err(|err| {
        HandlerError::internal(ApiError::PasswordHashFailed(err.to_string()))
    })?;

    let mut model: customer::ActiveModel = model.into();
    model.password = Set(password);
    model.update(&txn).await?;

    let mut reset: password_reset::ActiveModel = reset.into();
    reset.used = Set(true);
    reset.update(&txn).await?;

    txn.commit().await?;

    Ok(message(StatusCode::OK, "Password updated"))
}

//Structs
#[derive(Deserialize, Validate)]
struct RegisterPayload {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(max = 20))]
    phone: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyPayload {
    token: String,
}

#[derive(Deserialize)]
struct RefreshPayload {
    refresh: String,
}

#[derive(Deserialize)]
struct PasswordResetPayload {
    email: String,
}

#[derive(Deserialize, Validate)]
struct PasswordResetConfirm {
    token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    id: i32,
    name: String,
    email: String,
    phone: Option<String>,
    is_staff: bool,
}

impl CustomerResponse {
    pub fn new(value: customer::Model) -> CustomerResponse {
        CustomerResponse {
            id: value.id,
            name: value.name,
            email: value.email,
            phone: value.phone,
            is_staff: value.is_staff,
        }
    }
}
