use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, TransactionTrait};
use std::sync::Arc;

use crate::entities::{category, category::Entity as CategoryEntity};
use crate::middleware::logging::{ok, HandlerError, HandlerResult};

pub fn category_router() -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/category/:id", get(get_category))
}

async fn get_categories(Extension(db): Extension<Arc<DatabaseConnection>>) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let categories = CategoryEntity::find()
        .order_by_asc(category::Column::Name)
        .all(&txn)
        .await?;

    Ok(ok(Json(categories)))
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let category = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No category with {} id was found.", id)))?;

    Ok(ok(Json(category)))
}
