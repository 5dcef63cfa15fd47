use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use thiserror::Error;

use crate::entities::{order, order_line, product};

#[derive(Clone, Debug, Serialize)]
pub struct OrderLineView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub purchase_price: i64,
    pub subtotal: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub status_label: &'static str,
    pub can_cancel: bool,
    pub lines: Vec<OrderLineView>,
}

pub async fn load_order_detail<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
) -> Result<OrderDetail, DbErr> {
    let lines = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(order.id))
        .find_also_related(product::Entity)
        .order_by_asc(order_line::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|(line, product)| OrderLineView {
            id: line.id,
            product_id: line.product_id,
            product_name: product.map(|product| product.name).unwrap_or_default(),
            quantity: line.quantity,
            purchase_price: line.purchase_price,
            subtotal: line.subtotal(),
        })
        .collect();

    Ok(OrderDetail {
        status_label: order.status.label(),
        can_cancel: order.status.can_cancel(),
        order,
        lines,
    })
}

#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("Cannot move order from {from} to {to}")]
    NotAllowed {
        from: order::Status,
        to: order::Status,
    },
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Moves an order one step along its lifecycle, stamping the matching
/// timestamp. Cancelling puts the ordered units back in stock.
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    current: order::Model,
    next: order::Status,
    tracking_number: Option<String>,
    now: DateTime<Utc>,
) -> Result<order::Model, TransitionError> {
    if !current.status.can_transition_to(next) {
        return Err(TransitionError::NotAllowed {
            from: current.status,
            to: next,
        });
    }

    if next == order::Status::Cancelled {
        restock(conn, current.id).await?;
    }

    let mut model: order::ActiveModel = current.into();
    model.status = Set(next);
    match next {
        order::Status::Paid => model.paid_at = Set(Some(now)),
        order::Status::Shipped => {
            model.shipped_at = Set(Some(now));
            if let Some(tracking_number) = tracking_number.filter(|value| !value.trim().is_empty())
            {
                model.tracking_number = Set(Some(tracking_number));
            }
        }
        order::Status::Completed => model.delivered_at = Set(Some(now)),
        _ => {}
    }

    Ok(model.update(conn).await?)
}

async fn restock<C: ConnectionTrait>(conn: &C, order_id: i32) -> Result<(), DbErr> {
    let lines = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;

    for line in lines {
        product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(line.quantity),
            )
            .filter(product::Column::Id.eq(line.product_id))
            .exec(conn)
            .await?;
    }

    Ok(())
}
