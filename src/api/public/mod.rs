pub mod auth;
pub mod category;
pub mod offer;
pub mod product;
pub mod tracking;
pub mod uploads;

use axum::Router;

use auth::auth_router;
use category::category_router;
use offer::offer_router;
use product::product_router;
use tracking::tracking_router;
use uploads::uploads_router;

pub fn public_api_router() -> Router {
    Router::new()
        .merge(auth_router())
        .merge(category_router())
        .merge(product_router())
        .merge(offer_router())
        .merge(uploads_router())
        .merge(tracking_router())
}
