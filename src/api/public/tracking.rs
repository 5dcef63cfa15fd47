use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::{customer::normalize_email, order};
use crate::middleware::logging::{ok, HandlerError, HandlerResult};

pub fn tracking_router() -> Router {
    Router::new().route("/orders/track", get(track_order))
}

/// Order status lookup for guests: the id alone is not enough, the
/// e-mail given at checkout has to match too, compared the same way as
/// account e-mails (domain case-insensitive, local part exact).
async fn track_order(
    Query(params): Query<TrackQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;
    let email = normalize_email(&params.email);

    let found = order::Entity::find_by_id(params.order_id)
        .one(&txn)
        .await?
        .filter(|found| normalize_email(&found.customer_email) == email)
        .ok_or_else(|| HandlerError::not_found("No order matches that id and email"))?;

    Ok(ok(Json(TrackingResponse {
        id: found.id,
        status: found.status,
        status_label: found.status.label(),
        created_at: found.created_at,
        paid_at: found.paid_at,
        shipped_at: found.shipped_at,
        delivered_at: found.delivered_at,
        tracking_number: found.tracking_number,
        total: found.total,
    })))
}

#[derive(Deserialize)]
struct TrackQuery {
    order_id: i32,
    email: String,
}

#[derive(Serialize)]
struct TrackingResponse {
    id: i32,
    status: order::Status,
    status_label: &'static str,
    created_at: chrono::DateTime<chrono::Utc>,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    shipped_at: Option<chrono::DateTime<chrono::Utc>>,
    delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    tracking_number: Option<String>,
    total: i64,
}
