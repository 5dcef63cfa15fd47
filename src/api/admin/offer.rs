use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::entities::{
    offer::{self, Entity as OfferEntity},
    product,
};
use crate::middleware::logging::{message, ok, HandlerError, HandlerResult};

pub fn admin_offer_router() -> Router {
    Router::new()
        .route("/offer", get(admin_get_offers).post(create_offer))
        .route(
            "/offer/:id",
            get(admin_get_offer).patch(patch_offer).delete(delete_offer),
        )
}

async fn admin_get_offers(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<OffersQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let mut finder = OfferEntity::find();
    if let Some(product_id) = query.product {
        finder = finder.filter(offer::Column::ProductId.eq(product_id));
    }

    let offers = finder
        .order_by_desc(offer::Column::StartsAt)
        .order_by_asc(offer::Column::Id)
        .all(&txn)
        .await?;

    Ok(ok(Json(offers)))
}

async fn admin_get_offer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = find_offer(&txn, id).await?;

    Ok(ok(Json(found)))
}

async fn create_offer(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateOffer>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;
    check_window(payload.starts_at, payload.ends_at)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    product::Entity::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or_else(|| {
            HandlerError::bad_request(format!(
                "No product with {} id was found",
                payload.product_id
            ))
        })?;

    let model = offer::ActiveModel {
        product_id: Set(payload.product_id),
        offer_price: Set(payload.offer_price),
        starts_at: Set(payload.starts_at),
        ends_at: Set(payload.ends_at),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(ok((StatusCode::CREATED, Json(model))))
}

async fn patch_offer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchOffer>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = find_offer(&txn, id).await?;
    let starts_at = payload.starts_at.unwrap_or(found.starts_at);
    let ends_at = payload.ends_at.unwrap_or(found.ends_at);
    check_window(starts_at, ends_at)?;

    let mut model: offer::ActiveModel = found.into();
    if let Some(offer_price) = payload.offer_price {
        model.offer_price = Set(offer_price);
    }
    model.starts_at = Set(starts_at);
    model.ends_at = Set(ends_at);

    let model = model.update(&txn).await?;
    txn.commit().await?;

    Ok(ok(Json(model)))
}

async fn delete_offer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = find_offer(&txn, id).await?;
    OfferEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(message(StatusCode::OK, "Resource deleted successfully."))
}

async fn find_offer<C: ConnectionTrait>(conn: &C, id: i32) -> Result<offer::Model, HandlerError> {
    OfferEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No offer with {} id was found.", id)))
}

fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), HandlerError> {
    if starts_at > ends_at {
        return Err(HandlerError::validation(
            ValidationError::new("offer_window")
                .with_message("The offer must start before it ends".into()),
        ));
    }
    Ok(())
}

#[derive(Deserialize, Validate)]
struct CreateOffer {
    product_id: i32,
    #[validate(range(min = 1, max = 1_000_000_000, message = "Offer price must be between 1 and 1.000.000.000"))]
    offer_price: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

#[derive(Deserialize, Validate)]
struct PatchOffer {
    #[validate(range(min = 1, max = 1_000_000_000, message = "Offer price must be between 1 and 1.000.000.000"))]
    offer_price: Option<i64>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct OffersQuery {
    product: Option<i32>,
}
