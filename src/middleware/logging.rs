use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();

    match response.extensions().get::<Result<(), ApiError>>() {
        Some(Ok(_)) => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
        Some(Err(value)) => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %value,
            "Failed to process request"
        ),
        None => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request, but no Response extension is set"
        ),
    }

    response
}

#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Failed to create transaction")]
    TransactionCreationFailed,
    #[error("Failed to hash password {0}")]
    PasswordHashFailed(String),
    #[error("{0}")]
    General(String),
    #[error("Failed to generate token: {0}")]
    TokenGenerationFailed(String),
    #[error("Database error: {0}")]
    DbError(String),
    #[error("Failed to validate: {0}")]
    ValidationFail(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Template error: {0}")]
    Template(String),
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::DbError(err.to_string())
    }
}

pub fn to_response<T: IntoResponse>(
    response: T,               //The response that we are sending + StatusCode
    ext: Result<(), ApiError>, //The extension, that we want to give logging middleware
) -> Response {
    let mut response = response.into_response();

    response.extensions_mut().insert(ext);

    response
}

/// Successful response, tagged for the logging middleware.
pub fn ok<T: IntoResponse>(response: T) -> Response {
    to_response(response, Ok(()))
}

pub fn message(status: StatusCode, text: &str) -> Response {
    ok((status, Json(json!({ "message": text }))))
}

/// A failed request: what the client sees and what gets logged.
#[derive(Debug)]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
    pub source: ApiError,
}

pub type HandlerResult = Result<Response, HandlerError>;

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>, source: ApiError) -> Self {
        HandlerError {
            status,
            message: message.into(),
            source,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            StatusCode::BAD_REQUEST,
            message.clone(),
            ApiError::General(message),
        )
    }

    pub fn validation(err: impl ToString) -> Self {
        let detail = err.to_string();
        Self::new(
            StatusCode::BAD_REQUEST,
            detail.clone(),
            ApiError::ValidationFail(detail),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            StatusCode::NOT_FOUND,
            message.clone(),
            ApiError::NotFound(message),
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.clone(),
            ApiError::Unauthorized(message),
        )
    }

    pub fn conflict(message: impl Into<String>, err: DbErr) -> Self {
        Self::new(StatusCode::CONFLICT, message, err.into())
    }

    pub fn internal(source: ApiError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            source,
        )
    }

    pub fn transaction() -> Self {
        Self::internal(ApiError::TransactionCreationFailed)
    }
}

impl From<DbErr> for HandlerError {
    fn from(err: DbErr) -> Self {
        HandlerError::internal(err.into())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        to_response(
            (self.status, Json(json!({ "error": self.message }))),
            Err(self.source),
        )
    }
}
