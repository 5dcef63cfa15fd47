pub mod category;
pub mod customer;
pub mod offer;
pub mod order;
pub mod product;
pub mod upload;

use axum::{middleware::from_fn_with_state, Router};

use category::admin_category_router;
use customer::admin_customer_router;
use offer::admin_offer_router;
use order::admin_order_router;
use product::admin_product_router;
use upload::upload_router;

use crate::entities::customer::Role;
use crate::middleware::auth::{auth_middleware, AuthState};

pub fn admin_api_router(auth: AuthState) -> Router {
    let file_size_limit = auth.config.file_size_limit;

    Router::new()
        .merge(admin_category_router())
        .merge(admin_product_router())
        .merge(upload_router(file_size_limit))
        .merge(admin_offer_router())
        .merge(admin_customer_router())
        .merge(admin_order_router())
        .route_layer(from_fn_with_state(
            AuthState {
                role: Role::Staff,
                ..auth
            },
            auth_middleware,
        ))
}
