pub mod auth;
pub mod cart_session;
pub mod logging;
