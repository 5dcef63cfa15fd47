use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::middleware::{
    cart_session::CartSession,
    logging::{ok, HandlerError, HandlerResult},
};
use crate::shop::cart::{self, CartError};

//ROUTERS
pub fn cart_router() -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_product).delete(clear_cart))
        .route("/cart/:id", patch(patch_entry).delete(remove_product))
}

impl From<CartError> for HandlerError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Db(err) => err.into(),
            CartError::UnknownProduct(_) | CartError::UnknownEntry(_) => {
                HandlerError::not_found(err.to_string())
            }
            other => HandlerError::bad_request(other.to_string()),
        }
    }
}

async fn get_cart(
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let view = cart::load_cart(&txn, &session.key, Utc::now()).await?;

    Ok(session.attach_cookie(ok(Json(view))))
}

async fn add_product(
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<AddProduct>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let created = cart::add_item(&txn, &session.key, payload.product_id, payload.quantity).await?;
    let view = cart::load_cart(&txn, &session.key, Utc::now()).await?;
    txn.commit().await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(session.attach_cookie(ok((status, Json(view)))))
}

async fn patch_entry(
    Path(id): Path<i32>,
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCart>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    cart::set_quantity(&txn, &session.key, id, payload.quantity).await?;
    let view = cart::load_cart(&txn, &session.key, Utc::now()).await?;
    txn.commit().await?;

    Ok(session.attach_cookie(ok(Json(view))))
}

async fn remove_product(
    Path(id): Path<i32>,
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    cart::remove_item(&txn, &session.key, id).await?;
    let view = cart::load_cart(&txn, &session.key, Utc::now()).await?;
    txn.commit().await?;

    Ok(session.attach_cookie(ok(Json(view))))
}

async fn clear_cart(
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let removed = cart::clear(&txn, &session.key).await?;
    txn.commit().await?;

    Ok(session.attach_cookie(ok(Json(json!({
        "message": "Cart cleared",
        "removed": removed
    })))))
}

//Structs
#[derive(Deserialize, Debug)]
struct AddProduct {
    product_id: i32,
    quantity: i32,
}

#[derive(Deserialize)]
struct PatchCart {
    quantity: i32,
}
