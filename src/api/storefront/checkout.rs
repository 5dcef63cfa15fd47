use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::{customer, order::PaymentMethod};
use crate::middleware::{
    cart_session::CartSession,
    logging::{ok, HandlerError, HandlerResult},
};
use crate::shop::checkout::{place_order, CheckoutDetails, CheckoutError};

pub fn checkout_router() -> Router {
    Router::new().route("/checkout", post(checkout))
}

impl From<CheckoutError> for HandlerError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Db(err) => err.into(),
            other => HandlerError::bad_request(other.to_string()),
        }
    }
}

async fn checkout(
    session: CartSession,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CheckoutPayload>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let account = match session.customer_id {
        Some(id) => Some(
            customer::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .filter(|account| account.is_active)
                .ok_or_else(|| HandlerError::unauthorized("Invalid user id or role"))?,
        ),
        None => None,
    };

    let details = payload.into_details(account)?;
    let detail = place_order(&txn, &session.key, details, Utc::now()).await?;
    txn.commit().await?;

    info!(
        order_id = detail.order.id,
        total = detail.order.total,
        guest = detail.order.is_guest(),
        "Order placed"
    );

    Ok(session.attach_cookie(ok((StatusCode::CREATED, Json(detail)))))
}

#[derive(Deserialize, Validate)]
struct CheckoutPayload {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    phone: Option<String>,
    #[validate(length(min = 1, max = 500))]
    address: String,
    #[validate(length(min = 1, max = 100))]
    region: String,
    #[validate(length(min = 1, max = 100))]
    commune: String,
    #[validate(length(max = 20))]
    postal_code: Option<String>,
    reference: Option<String>,
    notes: Option<String>,
    #[serde(default = "default_payment_method")]
    payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Transfer
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

impl CheckoutPayload {
    /// Guests must give their contact data; customers fall back to the
    /// profile for anything left out.
    fn into_details(self, account: Option<customer::Model>) -> Result<CheckoutDetails, HandlerError> {
        let missing = |field: &str| HandlerError::bad_request(format!("{} is required", field));

        let (customer_id, name, email, phone) = match account {
            Some(account) => (
                Some(account.id),
                non_blank(self.name).unwrap_or(account.name),
                non_blank(self.email).unwrap_or(account.email),
                non_blank(self.phone)
                    .or(account.phone)
                    .ok_or_else(|| missing("phone"))?,
            ),
            None => (
                None,
                non_blank(self.name).ok_or_else(|| missing("name"))?,
                non_blank(self.email).ok_or_else(|| missing("email"))?,
                non_blank(self.phone).ok_or_else(|| missing("phone"))?,
            ),
        };

        Ok(CheckoutDetails {
            customer_id,
            name,
            email: customer::normalize_email(&email),
            phone,
            address: self.address.trim().to_owned(),
            region: self.region.trim().to_owned(),
            commune: self.commune.trim().to_owned(),
            postal_code: non_blank(self.postal_code),
            reference: non_blank(self.reference),
            notes: non_blank(self.notes),
            payment_method: self.payment_method,
        })
    }
}
