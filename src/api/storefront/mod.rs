pub mod cart;
pub mod checkout;

use axum::Router;

use cart::cart_router;
use checkout::checkout_router;

/// Cart and checkout: open to guests and customers alike, the owner of
/// the cart is resolved per request by `CartSession`.
pub fn storefront_api_router() -> Router {
    Router::new()
        .merge(cart_router())
        .merge(checkout_router())
}
