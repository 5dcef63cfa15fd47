//! Storefront rules that sit between the HTTP handlers and the entities:
//! offer pricing, cart bookkeeping, checkout and the order lifecycle.

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod pricing;
