use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::product::{self, Entity as ProductEntity};
use crate::middleware::logging::{ok, HandlerError, HandlerResult};
use crate::shop::pricing::{price_products, products_on_offer, resolve_price, Pricing};

pub fn product_router() -> Router {
    Router::new()
        .route("/product", get(get_products))
        .route("/product/:id", get(get_product))
}

async fn get_products(
    Query(params): Query<GetProductsQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;
    let now = Utc::now();

    let mut condition = Condition::all().add(product::Column::IsAvailable.eq(true));

    //Filter zone
    if let Some(category) = params.category {
        condition = condition.add(product::Column::CategoryId.eq(category));
    }
    if let Some(min) = params.min {
        condition = condition.add(product::Column::UnitPrice.gte(min));
    }
    if let Some(max) = params.max {
        condition = condition.add(product::Column::UnitPrice.lte(max));
    }
    if let Some(query) = params.query.filter(|query| !query.trim().is_empty()) {
        condition = condition.add(product::Column::Name.contains(query.trim()));
    }
    if params.on_offer.unwrap_or(false) {
        condition = condition.add(product::Column::Id.is_in(products_on_offer(&txn, now).await?));
    }

    //Pagination zone
    let page: u64 = params.page.unwrap_or(1).max(1);
    let page_size: u64 = params.page_size.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| HandlerError::bad_request("Page is out of range"))?;

    let products = ProductEntity::find()
        .filter(condition)
        .order_by_asc(product::Column::Name)
        .limit(page_size)
        .offset(offset)
        .all(&txn)
        .await?;

    let prices = price_products(&txn, &products, now).await?;
    let response: Vec<ProductResponse> = products
        .into_iter()
        .filter_map(|prod| {
            let pricing = *prices.get(&prod.id)?;
            Some(ProductResponse::new(prod, pricing))
        })
        .collect();

    Ok(ok(Json(response)))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let prod = ProductEntity::find_by_id(id)
        .filter(product::Column::IsAvailable.eq(true))
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No product with {} id was found.", id)))?;

    let offers = crate::shop::pricing::offers_for(&txn, &[prod.id]).await?;
    let pricing = resolve_price(
        prod.unit_price,
        offers.get(&prod.id).map(Vec::as_slice).unwrap_or(&[]),
        Utc::now(),
    );

    Ok(ok(Json(ProductResponse::new(prod, pricing))))
}

#[derive(Deserialize)]
struct GetProductsQuery {
    category: Option<i32>,
    min: Option<i64>,
    max: Option<i64>,
    query: Option<String>,
    on_offer: Option<bool>,
    page: Option<u64>,
    page_size: Option<u64>,
}

#[derive(Serialize, Clone, Debug)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub unit_price: i64,
    pub price: i64,
    pub offer_price: Option<i64>,
    pub stock: i32,
    pub in_stock: bool,
    pub category_id: i32,
    pub image_id: Option<i32>,
}

impl ProductResponse {
    pub fn new(value: product::Model, pricing: Pricing) -> ProductResponse {
        ProductResponse {
            id: value.id,
            name: value.name,
            description: value.description,
            unit: value.unit,
            unit_price: pricing.unit_price,
            price: pricing.price,
            offer_price: pricing.offer_price,
            stock: value.stock,
            in_stock: value.stock > 0,
            category_id: value.category_id,
            image_id: value.image_id,
        }
    }
}
