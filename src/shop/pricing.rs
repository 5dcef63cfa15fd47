use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::HashMap;

use crate::entities::{offer, product};

/// Price of a product at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pricing {
    pub unit_price: i64,
    pub price: i64,
    pub offer_price: Option<i64>,
}

/// Lowest active offer wins, but an offer never raises the price.
pub fn resolve_price(unit_price: i64, offers: &[offer::Model], now: DateTime<Utc>) -> Pricing {
    let best_offer = offers
        .iter()
        .filter(|offer| offer.is_active_at(now))
        .map(|offer| offer.offer_price)
        .min()
        .filter(|offer_price| *offer_price < unit_price);

    Pricing {
        unit_price,
        price: best_offer.unwrap_or(unit_price),
        offer_price: best_offer,
    }
}

/// Offers of the given products, grouped by product id.
pub async fn offers_for<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i32],
) -> Result<HashMap<i32, Vec<offer::Model>>, DbErr> {
    let mut grouped: HashMap<i32, Vec<offer::Model>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }

    let offers = offer::Entity::find()
        .filter(offer::Column::ProductId.is_in(product_ids.to_vec()))
        .all(conn)
        .await?;
    for offer in offers {
        grouped.entry(offer.product_id).or_default().push(offer);
    }

    Ok(grouped)
}

/// Resolves prices for a batch of products with one offer query.
pub async fn price_products<C: ConnectionTrait>(
    conn: &C,
    products: &[product::Model],
    now: DateTime<Utc>,
) -> Result<HashMap<i32, Pricing>, DbErr> {
    let ids: Vec<i32> = products.iter().map(|product| product.id).collect();
    let offers = offers_for(conn, &ids).await?;

    Ok(products
        .iter()
        .map(|product| {
            let pricing = resolve_price(
                product.unit_price,
                offers.get(&product.id).map(Vec::as_slice).unwrap_or(&[]),
                now,
            );
            (product.id, pricing)
        })
        .collect())
}

/// Ids of products that have an offer running at `now`.
pub async fn products_on_offer<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<Vec<i32>, DbErr> {
    let mut ids: Vec<i32> = offer::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .filter(|offer| offer.is_active_at(now))
        .map(|offer| offer.product_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(price: i64, starts: DateTime<Utc>, ends: DateTime<Utc>) -> offer::Model {
        offer::Model {
            id: 1,
            product_id: 1,
            offer_price: price,
            starts_at: starts,
            ends_at: ends,
        }
    }

    #[test]
    fn no_offer_keeps_unit_price() {
        let pricing = resolve_price(2500, &[], Utc::now());
        assert_eq!(pricing.price, 2500);
        assert_eq!(pricing.offer_price, None);
    }

    #[test]
    fn active_offer_applies_and_window_is_inclusive() {
        let now = Utc::now();
        let offers = [offer(1990, now, now)];
        let pricing = resolve_price(2500, &offers, now);
        assert_eq!(pricing.price, 1990);
        assert_eq!(pricing.offer_price, Some(1990));
    }

    #[test]
    fn expired_and_future_offers_are_ignored() {
        let now = Utc::now();
        let offers = [
            offer(1000, now - Duration::days(10), now - Duration::days(1)),
            offer(900, now + Duration::days(1), now + Duration::days(10)),
        ];
        assert_eq!(resolve_price(2500, &offers, now).price, 2500);
    }

    #[test]
    fn cheapest_active_offer_wins() {
        let now = Utc::now();
        let offers = [
            offer(2000, now - Duration::hours(1), now + Duration::hours(1)),
            offer(1800, now - Duration::hours(1), now + Duration::hours(1)),
        ];
        assert_eq!(resolve_price(2500, &offers, now).price, 1800);
    }

    #[test]
    fn offer_above_unit_price_is_not_used() {
        let now = Utc::now();
        let offers = [offer(3000, now - Duration::hours(1), now + Duration::hours(1))];
        let pricing = resolve_price(2500, &offers, now);
        assert_eq!(pricing.price, 2500);
        assert_eq!(pricing.offer_price, None);
    }
}
