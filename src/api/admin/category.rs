use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::entities::{category, category::Entity as CategoryEntity};
use crate::middleware::logging::{message, ok, HandlerError, HandlerResult};

//ROUTERS
pub fn admin_category_router() -> Router {
    Router::new()
        .route("/category", get(admin_get_categories).post(create_category))
        .route(
            "/category/:id",
            patch(patch_category).delete(delete_category),
        )
}

//ROUTES
async fn admin_get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CategoriesQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };

    let sort_column = match query.sort_by.as_deref() {
        Some("name") => category::Column::Name,
        _ => category::Column::Id,
    };

    let mut finder = CategoryEntity::find();

    if let Some(query) = query.query {
        let mut query_condition = Condition::any().add(category::Column::Name.contains(&query));
        if let Ok(id) = query.parse::<i32>() {
            query_condition = query_condition.add(category::Column::Id.eq(id));
        }
        finder = finder.filter(query_condition);
    }

    let categories = finder.order_by(sort_column, order).all(&txn).await?;

    Ok(ok(Json(categories)))
}

async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCategory>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let new_category = category::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        description: Set(payload.description),
        ..Default::default()
    };

    let model = new_category
        .insert(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Category already exists", err))?;
    txn.commit().await?;

    Ok(ok((StatusCode::CREATED, Json(model))))
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCategory>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No category with {} id was found.", id)))?;

    let mut model: category::ActiveModel = model.into();
    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_owned());
    }
    if let Some(description) = payload.description {
        model.description = Set((!description.is_empty()).then_some(description));
    }

    //DB Failed / unique constraint
    let model = model
        .update(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Category name already taken", err))?;
    txn.commit().await?;

    Ok(ok(Json(model)))
}

/// Products of the category go with it.
async fn delete_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = CategoryEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No category with {} id was found.", id)))?;

    CategoryEntity::delete_by_id(model.id)
        .exec(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Category has products that were ordered", err))?;
    txn.commit().await?;

    Ok(message(StatusCode::OK, "Resource deleted successfully"))
}

//Structs
#[derive(Deserialize, Validate)]
struct CreateCategory {
    #[validate(length(min = 1, max = 255))]
    name: String,
    description: Option<String>,
}

#[derive(Deserialize, Validate)]
struct PatchCategory {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CategoriesQuery {
    query: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
}
