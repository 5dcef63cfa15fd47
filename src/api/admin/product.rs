use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::entities::{
    category, image,
    product::{self, Entity as ProductEntity},
};
use crate::middleware::logging::{message, ok, HandlerError, HandlerResult};
use crate::shop::pricing::{price_products, Pricing};

//ROUTERS
pub fn admin_product_router() -> Router {
    Router::new()
        .route("/product", get(admin_get_products).post(create_product))
        .route(
            "/product/:id",
            get(admin_get_product)
                .patch(patch_product)
                .delete(delete_product),
        )
}

//ROUTES
async fn admin_get_products(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<ProductsQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };

    let sort_column = match query.sort_by.as_deref() {
        Some("name") => product::Column::Name,
        Some("price") => product::Column::UnitPrice,
        Some("stock") => product::Column::Stock,
        _ => product::Column::Id,
    };

    let mut condition = Condition::all();
    if let Some(category_id) = query.category {
        condition = condition.add(product::Column::CategoryId.eq(category_id));
    }
    if let Some(is_available) = query.is_available {
        condition = condition.add(product::Column::IsAvailable.eq(is_available));
    }
    if let Some(low_stock) = query.stock_below {
        condition = condition.add(product::Column::Stock.lt(low_stock));
    }
    if let Some(query) = query.query {
        let mut query_condition = Condition::any().add(product::Column::Name.contains(&query));
        if let Ok(id) = query.parse::<i32>() {
            query_condition = query_condition.add(product::Column::Id.eq(id));
        }
        condition = condition.add(query_condition);
    }

    let products = ProductEntity::find()
        .filter(condition)
        .order_by(sort_column, order)
        .all(&txn)
        .await?;

    let prices = price_products(&txn, &products, Utc::now()).await?;
    let response: Vec<AdminProductResponse> = products
        .into_iter()
        .filter_map(|prod| {
            let pricing = *prices.get(&prod.id)?;
            Some(AdminProductResponse::new(prod, pricing))
        })
        .collect();

    Ok(ok(Json(response)))
}

async fn admin_get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let prod = find_product(&txn, id).await?;
    let prices = price_products(&txn, std::slice::from_ref(&prod), Utc::now()).await?;
    let pricing = prices
        .get(&prod.id)
        .copied()
        .unwrap_or(Pricing {
            unit_price: prod.unit_price,
            price: prod.unit_price,
            offer_price: None,
        });

    Ok(ok(Json(AdminProductResponse::new(prod, pricing))))
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateProduct>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    ensure_category(&txn, payload.category_id).await?;
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
    }

    let new_product = product::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        description: Set(payload.description),
        unit_price: Set(payload.unit_price),
        unit: Set(payload.unit),
        stock: Set(payload.stock),
        category_id: Set(payload.category_id),
        image_id: Set(payload.image_id),
        is_available: Set(payload.is_available.unwrap_or(true)),
        ..Default::default()
    };

    let model = new_product
        .insert(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Product already exists", err))?;
    txn.commit().await?;

    Ok(ok((StatusCode::CREATED, Json(model))))
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchProductPayload>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = find_product(&txn, id).await?;
    let mut model: product::ActiveModel = model.into();

    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_owned());
    }
    if let Some(description) = payload.description {
        model.description = Set(description);
    }
    if let Some(unit_price) = payload.unit_price {
        model.unit_price = Set(unit_price);
    }
    if let Some(unit) = payload.unit {
        model.unit = Set(unit);
    }
    if let Some(stock) = payload.stock {
        model.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        ensure_category(&txn, category_id).await?;
        model.category_id = Set(category_id);
    }
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
        model.image_id = Set(Some(image_id));
    }
    if payload.remove_image.unwrap_or(false) {
        model.image_id = Set(None);
    }
    if let Some(is_available) = payload.is_available {
        model.is_available = Set(is_available);
    }

    //DB Failed / unique constraint
    let model = model
        .update(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Failed to patch this resource", err))?;
    txn.commit().await?;

    Ok(ok(Json(model)))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = find_product(&txn, id).await?;

    // Order lines restrict the delete; such products should be made unavailable instead.
    ProductEntity::delete_by_id(model.id)
        .exec(&txn)
        .await
        .map_err(|err| {
            HandlerError::conflict(
                "Product is referenced by orders, mark it unavailable instead",
                err,
            )
        })?;
    txn.commit().await?;

    Ok(message(StatusCode::OK, "Resource deleted successfully."))
}

//utils
async fn find_product<C: ConnectionTrait>(conn: &C, id: i32) -> Result<product::Model, HandlerError> {
    ProductEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No product with {} id was found.", id)))
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), HandlerError> {
    category::Entity::find_by_id(id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| HandlerError::bad_request(format!("No category with {id} id was found")))
}

async fn ensure_image<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), HandlerError> {
    image::Entity::find_by_id(id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| HandlerError::bad_request(format!("No image with {id} id was found")))
}

//Structs
#[derive(Deserialize, Validate)]
struct CreateProduct {
    #[validate(length(min = 1, max = 50))]
    name: String,
    #[validate(length(max = 250))]
    description: String,
    #[validate(range(min = 0, max = 1_000_000_000, message = "Price must be between 0 and 1.000.000.000"))]
    unit_price: i64,
    #[validate(length(min = 1, max = 20))]
    unit: String,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    stock: i32,
    category_id: i32,
    image_id: Option<i32>,
    is_available: Option<bool>,
}

#[derive(Deserialize, Validate)]
struct PatchProductPayload {
    #[validate(length(min = 1, max = 50))]
    name: Option<String>,
    #[validate(length(max = 250))]
    description: Option<String>,
    #[validate(range(min = 0, max = 1_000_000_000, message = "Price must be between 0 and 1.000.000.000"))]
    unit_price: Option<i64>,
    #[validate(length(min = 1, max = 20))]
    unit: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    stock: Option<i32>,
    category_id: Option<i32>,
    image_id: Option<i32>,
    remove_image: Option<bool>,
    is_available: Option<bool>,
}

#[derive(Deserialize)]
struct ProductsQuery {
    query: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
    category: Option<i32>,
    is_available: Option<bool>,
    stock_below: Option<i32>,
}

#[derive(Serialize)]
struct AdminProductResponse {
    #[serde(flatten)]
    product: product::Model,
    price: i64,
    offer_price: Option<i64>,
}

impl AdminProductResponse {
    fn new(product: product::Model, pricing: Pricing) -> AdminProductResponse {
        AdminProductResponse {
            product,
            price: pricing.price,
            offer_price: pricing.offer_price,
        }
    }
}
