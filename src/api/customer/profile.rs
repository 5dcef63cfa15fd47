use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::public::auth::CustomerResponse;
use crate::entities::customer::{self, Entity as CustomerEntity};
use crate::middleware::{
    auth::Claims,
    logging::{ok, HandlerError, HandlerResult},
};

pub fn profile_router() -> Router {
    Router::new().route("/profile", get(get_profile).patch(patch_profile))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = CustomerEntity::find_by_id(claims.customer_id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found("Not found"))?;

    Ok(ok(Json(CustomerResponse::new(model))))
}

async fn patch_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchProfile>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let model = CustomerEntity::find_by_id(claims.customer_id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found("Not found"))?;

    let mut model: customer::ActiveModel = model.into();
    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_owned());
    }
    if let Some(phone) = payload.phone {
        let phone = phone.trim().to_owned();
        model.phone = Set((!phone.is_empty()).then_some(phone));
    }
    let model = model.update(&txn).await?;
    txn.commit().await?;

    Ok(ok(Json(CustomerResponse::new(model))))
}

#[derive(Deserialize, Validate)]
struct PatchProfile {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    #[validate(length(max = 20))]
    phone: Option<String>,
}
