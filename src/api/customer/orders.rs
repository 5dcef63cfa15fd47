use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::info;

use crate::entities::order;
use crate::middleware::{
    auth::Claims,
    logging::{ok, HandlerError, HandlerResult},
};
use crate::shop::orders::{load_order_detail, transition, TransitionError};

pub fn orders_router() -> Router {
    Router::new()
        .route("/orders", get(get_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

impl From<TransitionError> for HandlerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Db(err) => err.into(),
            other => HandlerError::bad_request(other.to_string()),
        }
    }
}

async fn get_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let orders = order::Entity::find()
        .filter(order::Column::CustomerId.eq(claims.customer_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(&txn)
        .await?;

    Ok(ok(Json(orders)))
}

async fn find_own_order<C: sea_orm::ConnectionTrait>(
    conn: &C,
    customer_id: i32,
    id: i32,
) -> Result<order::Model, HandlerError> {
    order::Entity::find_by_id(id)
        .filter(order::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No order with {} id was found.", id)))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = find_own_order(&txn, claims.customer_id, id).await?;
    let detail = load_order_detail(&txn, found).await?;

    Ok(ok(Json(detail)))
}

async fn cancel_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = find_own_order(&txn, claims.customer_id, id).await?;
    let updated = transition(&txn, found, order::Status::Cancelled, None, Utc::now()).await?;
    let detail = load_order_detail(&txn, updated).await?;
    txn.commit().await?;

    info!(order_id = id, customer_id = claims.customer_id, "Order cancelled by customer");

    Ok(ok(Json(detail)))
}
