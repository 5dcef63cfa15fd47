use axum::{extract::Extension, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;

use crate::entities::{offer, product};
use crate::middleware::logging::{ok, HandlerError, HandlerResult};

pub fn offer_router() -> Router {
    Router::new().route("/offer", get(get_active_offers))
}

/// Offers running right now on available products.
async fn get_active_offers(Extension(db): Extension<Arc<DatabaseConnection>>) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;
    let now = Utc::now();

    let offers = offer::Entity::find()
        .find_also_related(product::Entity)
        .order_by_asc(offer::Column::EndsAt)
        .all(&txn)
        .await?;

    let response: Vec<ActiveOfferResponse> = offers
        .into_iter()
        .filter(|(offer, _)| offer.is_active_at(now))
        .filter_map(|(offer, product)| {
            let product = product.filter(|product| product.is_available)?;
            Some(ActiveOfferResponse {
                id: offer.id,
                product_id: product.id,
                product_name: product.name,
                unit_price: product.unit_price,
                offer_price: offer.offer_price,
                starts_at: offer.starts_at,
                ends_at: offer.ends_at,
            })
        })
        .collect();

    Ok(ok(Json(response)))
}

#[derive(Serialize)]
struct ActiveOfferResponse {
    id: i32,
    product_id: i32,
    product_name: String,
    unit_price: i64,
    offer_price: i64,
    starts_at: chrono::DateTime<Utc>,
    ends_at: chrono::DateTime<Utc>,
}
