use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, Set,
};
use thiserror::Error;

use super::cart::{self, CartView};
use super::orders::{load_order_detail, OrderDetail};
use crate::entities::{order, order_line, product};

/// Contact and shipping data of an order, already resolved for guests and
/// customers alike.
#[derive(Clone, Debug)]
pub struct CheckoutDetails {
    pub customer_id: Option<i32>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub region: String,
    pub commune: String,
    pub postal_code: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub payment_method: order::PaymentMethod,
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("{0} is no longer available")]
    Unavailable(String),
    #[error("Only {available} units of {name} are in stock")]
    InsufficientStock { name: String, available: i32 },
    #[error("The order total is too large")]
    TotalTooLarge,
    #[error("Payment method is not available yet")]
    PaymentNotAccepted,
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Turns the cart into an order. Must run inside a transaction: stock is
/// decremented line by line and any failure has to roll everything back.
pub async fn place_order<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    details: CheckoutDetails,
    now: DateTime<Utc>,
) -> Result<OrderDetail, CheckoutError> {
    if !details.payment_method.is_accepted() {
        return Err(CheckoutError::PaymentNotAccepted);
    }

    let cart: CartView = cart::load_cart(conn, session_key, now).await?;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for line in &cart.items {
        if !line.is_available {
            return Err(CheckoutError::Unavailable(line.name.clone()));
        }
        if line.quantity > line.stock {
            return Err(CheckoutError::InsufficientStock {
                name: line.name.clone(),
                available: line.stock,
            });
        }
    }

    let total = cart
        .items
        .iter()
        .try_fold(0i64, |acc, line| {
            line.price
                .checked_mul(i64::from(line.quantity))
                .and_then(|subtotal| acc.checked_add(subtotal))
        })
        .ok_or(CheckoutError::TotalTooLarge)?;

    let new_order = order::ActiveModel {
        created_at: Set(now),
        total: Set(total),
        status: Set(order::Status::PendingPayment),
        payment_method: Set(details.payment_method),
        customer_id: Set(details.customer_id),
        customer_name: Set(details.name),
        customer_email: Set(details.email),
        customer_phone: Set(details.phone),
        address: Set(details.address),
        region: Set(details.region),
        commune: Set(details.commune),
        postal_code: Set(details.postal_code),
        address_reference: Set(details.reference),
        notes: Set(details.notes),
        paid_at: Set(None),
        shipped_at: Set(None),
        delivered_at: Set(None),
        tracking_number: Set(None),
        ..Default::default()
    };
    let order = new_order.insert(conn).await?;

    for line in &cart.items {
        // Guarded decrement: matches no row if stock moved under us.
        let updated = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .filter(product::Column::Id.eq(line.product_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(conn)
            .await?;
        if updated.rows_affected != 1 {
            return Err(CheckoutError::InsufficientStock {
                name: line.name.clone(),
                available: line.stock,
            });
        }

        let order_line = order_line::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            purchase_price: Set(line.price),
            ..Default::default()
        };
        order_line::Entity::insert(order_line).exec(conn).await?;
    }

    cart::clear(conn, session_key).await?;

    Ok(load_order_detail(conn, order).await?)
}
