use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::entities::order::{self, Entity as OrderEntity, Status};
use crate::middleware::{
    auth::Claims,
    logging::{ok, HandlerError, HandlerResult},
};
use crate::shop::orders::{load_order_detail, transition};

pub fn admin_order_router() -> Router {
    Router::new()
        .route("/order", get(admin_get_orders))
        .route("/order/:id", get(admin_get_order))
        .route("/order/:id/status", patch(change_status))
}

async fn admin_get_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<OrdersQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let order = match query.order.as_deref() {
        Some("asc") => sea_orm::Order::Asc,
        _ => sea_orm::Order::Desc,
    };

    let sort_column = match query.sort_by.as_deref() {
        Some("total") => order::Column::Total,
        Some("status") => order::Column::Status,
        Some("id") => order::Column::Id,
        _ => order::Column::CreatedAt,
    };

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(order::Column::Status.eq(status));
    }
    if let Some(customer_id) = query.customer {
        condition = condition.add(order::Column::CustomerId.eq(customer_id));
    }
    if let Some(query) = query.query {
        let mut query_condition = Condition::any()
            .add(order::Column::CustomerName.contains(&query))
            .add(order::Column::CustomerEmail.contains(&query));
        if let Ok(id) = query.parse::<i32>() {
            query_condition = query_condition.add(order::Column::Id.eq(id));
        }
        condition = condition.add(query_condition);
    }

    let orders = OrderEntity::find()
        .filter(condition)
        .order_by(sort_column, order)
        .order_by_desc(order::Column::Id)
        .all(&txn)
        .await?;

    Ok(ok(Json(orders)))
}

async fn admin_get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No order with {} id was found.", id)))?;
    let detail = load_order_detail(&txn, found).await?;

    Ok(ok(Json(detail)))
}

async fn change_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StatusPayload>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No order with {} id was found.", id)))?;
    let previous = found.status;

    let updated = transition(&txn, found, payload.status, payload.tracking_number, Utc::now()).await?;
    let detail = load_order_detail(&txn, updated).await?;
    txn.commit().await?;

    info!(
        order_id = id,
        from = %previous,
        to = %payload.status,
        staff_id = claims.customer_id,
        "Order status changed"
    );

    Ok(ok(Json(detail)))
}

#[derive(Deserialize)]
struct StatusPayload {
    status: Status,
    tracking_number: Option<String>,
}

#[derive(Deserialize)]
struct OrdersQuery {
    status: Option<Status>,
    customer: Option<i32>,
    query: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
}
