pub mod orders;
pub mod profile;

use axum::{middleware::from_fn_with_state, Router};

use crate::entities::customer::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use orders::orders_router;
use profile::profile_router;

pub fn customer_api_router(auth: AuthState) -> Router {
    Router::new()
        .merge(profile_router())
        .merge(orders_router())
        .route_layer(from_fn_with_state(
            AuthState {
                role: Role::Customer,
                ..auth
            },
            auth_middleware,
        ))
}
