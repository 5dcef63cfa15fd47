pub mod admin;
pub mod customer;
pub mod public;
pub mod storefront;

use axum::{extract::Extension, middleware::from_fn, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::entities::customer::Role;
use crate::middleware::{auth::AuthState, logging::logging_middleware};
use crate::pages::pages_router;
use admin::admin_api_router;
use customer::customer_api_router;
use public::public_api_router;
use storefront::storefront_api_router;

pub fn create_api_router(shared_db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    let auth = AuthState {
        db: shared_db.clone(),
        config: config.clone(),
        role: Role::Customer,
    };

    let api = Router::new()
        .merge(public_api_router())
        .merge(storefront_api_router())
        .merge(customer_api_router(auth.clone()));

    Router::new()
        .nest("/api", api)
        .nest("/api/admin", admin_api_router(auth))
        .merge(pages_router())
        .layer(from_fn(logging_middleware))
        .layer(Extension(shared_db))
        .layer(Extension(config))
        .layer(TraceLayer::new_for_http())
}
