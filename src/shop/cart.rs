use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;
use thiserror::Error;

use super::pricing::{price_products, Pricing};
use crate::entities::{cart_item, product};

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub name: String,
    pub unit: String,
    pub image_id: Option<i32>,
    pub unit_price: i64,
    pub price: i64,
    pub offer_price: Option<i64>,
    pub quantity: i32,
    pub subtotal: i64,
    pub is_available: bool,
    pub stock: i32,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: i64,
    pub total_quantity: i64,
}

impl CartView {
    pub fn from_lines(items: Vec<CartLine>) -> CartView {
        let total = items
            .iter()
            .fold(0i64, |acc, line| acc.saturating_add(line.subtotal));
        let total_quantity = items.iter().map(|line| i64::from(line.quantity)).sum();
        CartView {
            items,
            total,
            total_quantity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Quantity should be greater than 0")]
    InvalidQuantity,
    #[error("No product with {0} id was found")]
    UnknownProduct(i32),
    #[error("{0} is not available")]
    Unavailable(String),
    #[error("Only {available} units of {name} are in stock")]
    InsufficientStock { name: String, available: i32 },
    #[error("No related entry with {0} id was found.")]
    UnknownEntry(i32),
    #[error(transparent)]
    Db(#[from] DbErr),
}

fn line(entry: cart_item::Model, product: product::Model, pricing: Pricing) -> CartLine {
    CartLine {
        id: entry.id,
        product_id: product.id,
        name: product.name,
        unit: product.unit,
        image_id: product.image_id,
        unit_price: pricing.unit_price,
        price: pricing.price,
        offer_price: pricing.offer_price,
        quantity: entry.quantity,
        subtotal: pricing.price.saturating_mul(i64::from(entry.quantity)),
        is_available: product.is_available,
        stock: product.stock,
    }
}

/// Current contents of a cart, priced at `now`.
pub async fn load_cart<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    now: DateTime<Utc>,
) -> Result<CartView, DbErr> {
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::SessionKey.eq(session_key))
        .find_also_related(product::Entity)
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?;

    let rows: Vec<(cart_item::Model, product::Model)> = rows
        .into_iter()
        .filter_map(|(entry, product)| product.map(|product| (entry, product)))
        .collect();

    let products: Vec<product::Model> = rows.iter().map(|(_, product)| product.clone()).collect();
    let prices = price_products(conn, &products, now).await?;

    let items = rows
        .into_iter()
        .filter_map(|(entry, product)| {
            let pricing = *prices.get(&product.id)?;
            Some(line(entry, product, pricing))
        })
        .collect();

    Ok(CartView::from_lines(items))
}

fn check_stock(product: &product::Model, quantity: i32) -> Result<(), CartError> {
    if !product.is_available {
        return Err(CartError::Unavailable(product.name.clone()));
    }
    if quantity > product.stock {
        return Err(CartError::InsufficientStock {
            name: product.name.clone(),
            available: product.stock,
        });
    }
    Ok(())
}

/// Adds `quantity` units, merging with an existing line for the same product.
/// Returns `true` when a new line was created.
pub async fn add_item<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    product_id: i32,
    quantity: i32,
) -> Result<bool, CartError> {
    if quantity <= 0 {
        return Err(CartError::InvalidQuantity);
    }

    let product = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(CartError::UnknownProduct(product_id))?;

    let existing = cart_item::Entity::find()
        .filter(cart_item::Column::SessionKey.eq(session_key))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?;

    match existing {
        Some(entry) => {
            let quantity = entry.quantity.saturating_add(quantity);
            check_stock(&product, quantity)?;
            let mut entry: cart_item::ActiveModel = entry.into();
            entry.quantity = Set(quantity);
            entry.update(conn).await?;
            Ok(false)
        }
        None => {
            check_stock(&product, quantity)?;
            let entry = cart_item::ActiveModel {
                session_key: Set(session_key.to_owned()),
                product_id: Set(product_id),
                quantity: Set(quantity),
                added_at: Set(Utc::now()),
                ..Default::default()
            };
            cart_item::Entity::insert(entry).exec(conn).await?;
            Ok(true)
        }
    }
}

/// Sets the quantity of one line; zero removes it.
pub async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    entry_id: i32,
    quantity: i32,
) -> Result<(), CartError> {
    if quantity < 0 {
        return Err(CartError::InvalidQuantity);
    }

    let entry = cart_item::Entity::find_by_id(entry_id)
        .filter(cart_item::Column::SessionKey.eq(session_key))
        .one(conn)
        .await?
        .ok_or(CartError::UnknownEntry(entry_id))?;

    if quantity == 0 {
        cart_item::Entity::delete_by_id(entry.id).exec(conn).await?;
        return Ok(());
    }

    let product = product::Entity::find_by_id(entry.product_id)
        .one(conn)
        .await?
        .ok_or(CartError::UnknownProduct(entry.product_id))?;
    check_stock(&product, quantity)?;

    let mut entry: cart_item::ActiveModel = entry.into();
    entry.quantity = Set(quantity);
    entry.update(conn).await?;
    Ok(())
}

pub async fn remove_item<C: ConnectionTrait>(
    conn: &C,
    session_key: &str,
    entry_id: i32,
) -> Result<(), CartError> {
    let result = cart_item::Entity::delete_many()
        .filter(cart_item::Column::Id.eq(entry_id))
        .filter(cart_item::Column::SessionKey.eq(session_key))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(CartError::UnknownEntry(entry_id));
    }
    Ok(())
}

pub async fn clear<C: ConnectionTrait>(conn: &C, session_key: &str) -> Result<u64, DbErr> {
    let result = cart_item::Entity::delete_many()
        .filter(cart_item::Column::SessionKey.eq(session_key))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Moves an anonymous cart into a customer's cart. Quantities of products
/// present in both are added and capped at the available stock.
pub async fn merge_into<C: ConnectionTrait>(
    conn: &C,
    from_key: &str,
    to_key: &str,
) -> Result<usize, DbErr> {
    let entries = cart_item::Entity::find()
        .filter(cart_item::Column::SessionKey.eq(from_key))
        .find_also_related(product::Entity)
        .all(conn)
        .await?;

    let mut merged = 0;
    for (entry, product) in entries {
        let Some(product) = product else { continue };

        let target = cart_item::Entity::find()
            .filter(cart_item::Column::SessionKey.eq(to_key))
            .filter(cart_item::Column::ProductId.eq(entry.product_id))
            .one(conn)
            .await?;

        match target {
            Some(target) => {
                let quantity = target
                    .quantity
                    .saturating_add(entry.quantity)
                    .min(product.stock.max(target.quantity));
                let mut target: cart_item::ActiveModel = target.into();
                target.quantity = Set(quantity);
                target.update(conn).await?;
                cart_item::Entity::delete_by_id(entry.id).exec(conn).await?;
            }
            None => {
                let mut entry: cart_item::ActiveModel = entry.into();
                entry.session_key = Set(to_key.to_owned());
                entry.update(conn).await?;
            }
        }
        merged += 1;
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_line(id: i32, price: i64, quantity: i32) -> CartLine {
        CartLine {
            id,
            product_id: id,
            name: format!("Producto {}", id),
            unit: "kg".into(),
            image_id: None,
            unit_price: price,
            price,
            offer_price: None,
            quantity,
            subtotal: price.saturating_mul(i64::from(quantity)),
            is_available: true,
            stock: 100,
        }
    }

    #[test]
    fn total_is_sum_of_subtotals() {
        let view = CartView::from_lines(vec![
            cart_line(1, 1500, 2),
            cart_line(2, 990, 3),
            cart_line(3, 12000, 1),
        ]);
        let expected: i64 = view.items.iter().map(|line| line.subtotal).sum();
        assert_eq!(view.total, expected);
        assert_eq!(view.total, 3000 + 2970 + 12000);
        assert_eq!(view.total_quantity, 6);
    }

    #[test]
    fn empty_cart_totals_zero() {
        let view = CartView::from_lines(Vec::new());
        assert!(view.is_empty());
        assert_eq!(view.total, 0);
        assert_eq!(view.total_quantity, 0);
    }

    #[test]
    fn huge_totals_saturate() {
        let view = CartView::from_lines(vec![cart_line(1, i64::MAX / 2 + 1, 2), cart_line(2, 10, 1)]);
        assert_eq!(view.items[0].subtotal, i64::MAX);
        assert_eq!(view.total, i64::MAX);
    }
}
