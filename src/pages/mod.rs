//! Server-rendered storefront pages. Templates are compiled into the binary.

use axum::{
    extract::{Extension, Query},
    response::Html,
    routing::get,
    Router,
};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tera::{Context, Tera, Value};

use crate::entities::{category, product};
use crate::middleware::logging::{ok, ApiError, HandlerError, HandlerResult};
use crate::shop::pricing::{price_products, products_on_offer, Pricing};

const FEATURED_OFFERS: usize = 4;

static TEMPLATES: Lazy<Result<Tera, String>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../../templates/base.html")),
        ("macros.html", include_str!("../../templates/macros.html")),
        ("inicio.html", include_str!("../../templates/inicio.html")),
        ("nosotros.html", include_str!("../../templates/nosotros.html")),
        ("productos.html", include_str!("../../templates/productos.html")),
        ("ventas.html", include_str!("../../templates/ventas.html")),
    ])
    .map_err(|err| format!("{err:?}"))?;
    tera.register_filter("clp", clp_filter);
    Ok(tera)
});

pub fn pages_router() -> Router {
    Router::new()
        .route("/", get(inicio))
        .route("/nosotros", get(nosotros))
        .route("/productos", get(productos))
        .route("/ventas", get(ventas))
}

async fn inicio(Extension(db): Extension<Arc<DatabaseConnection>>) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;
    let now = Utc::now();

    let categories = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(&txn)
        .await?;

    let on_offer = products_on_offer(&txn, now).await?;
    let products = product::Entity::find()
        .filter(product::Column::IsAvailable.eq(true))
        .filter(product::Column::Id.is_in(on_offer))
        .order_by_asc(product::Column::Name)
        .all(&txn)
        .await?;
    let mut featured = cards(&txn, products, now).await?;
    featured.truncate(FEATURED_OFFERS);

    let mut context = page_context();
    context.insert("categories", &categories);
    context.insert("featured", &featured);
    render("inicio.html", &context)
}

async fn nosotros() -> HandlerResult {
    render("nosotros.html", &page_context())
}

async fn productos(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CatalogQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let categories = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(&txn)
        .await?;

    let mut condition = Condition::all().add(product::Column::IsAvailable.eq(true));
    if let Some(category_id) = query.categoria {
        condition = condition.add(product::Column::CategoryId.eq(category_id));
    }
    let products = product::Entity::find()
        .filter(condition)
        .order_by_asc(product::Column::Name)
        .all(&txn)
        .await?;

    let mut context = page_context();
    context.insert("categories", &categories);
    context.insert("selected", &query.categoria);
    context.insert("products", &cards(&txn, products, Utc::now()).await?);
    render("productos.html", &context)
}

async fn ventas(Extension(db): Extension<Arc<DatabaseConnection>>) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;
    let now = Utc::now();

    let on_offer = products_on_offer(&txn, now).await?;
    let products = product::Entity::find()
        .filter(product::Column::IsAvailable.eq(true))
        .filter(product::Column::Id.is_in(on_offer))
        .order_by_asc(product::Column::Name)
        .all(&txn)
        .await?;

    let mut context = page_context();
    context.insert("products", &cards(&txn, products, now).await?);
    render("ventas.html", &context)
}

fn page_context() -> Context {
    let mut context = Context::new();
    context.insert("year", &Utc::now().year());
    context
}

fn render(template: &str, context: &Context) -> HandlerResult {
    let tera = TEMPLATES
        .as_ref()
        .map_err(|err| HandlerError::internal(ApiError::Template(err.clone())))?;
    let html = tera
        .render(template, context)
        .map_err(|err| HandlerError::internal(ApiError::Template(format!("{err:?}"))))?;

    Ok(ok(Html(html)))
}

async fn cards<C: sea_orm::ConnectionTrait>(
    conn: &C,
    products: Vec<product::Model>,
    now: chrono::DateTime<Utc>,
) -> Result<Vec<ProductCard>, HandlerError> {
    let prices = price_products(conn, &products, now).await?;
    Ok(products
        .into_iter()
        .filter_map(|product| {
            let pricing = *prices.get(&product.id)?;
            Some(ProductCard::new(product, pricing))
        })
        .collect())
}

/// Formats whole pesos the Chilean way: `2500` becomes `$2.500`.
fn clp_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg(format!("clp expects an integer, got {value}")))?;
    Ok(Value::String(format_clp(amount)))
}

fn format_clp(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}${grouped}")
}

#[derive(Deserialize)]
struct CatalogQuery {
    categoria: Option<i32>,
}

#[derive(Serialize)]
struct ProductCard {
    id: i32,
    name: String,
    description: String,
    unit: String,
    stock: i32,
    image_id: Option<i32>,
    unit_price: i64,
    price: i64,
    offer_price: Option<i64>,
}

impl ProductCard {
    fn new(product: product::Model, pricing: Pricing) -> ProductCard {
        ProductCard {
            id: product.id,
            name: product.name,
            description: product.description,
            unit: product.unit,
            stock: product.stock,
            image_id: product.image_id,
            unit_price: pricing.unit_price,
            price: pricing.price,
            offer_price: pricing.offer_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_compile() {
        assert!(TEMPLATES.is_ok(), "{:?}", TEMPLATES.as_ref().err());
    }

    #[test]
    fn pesos_use_dot_grouping() {
        assert_eq!(format_clp(0), "$0");
        assert_eq!(format_clp(990), "$990");
        assert_eq!(format_clp(2500), "$2.500");
        assert_eq!(format_clp(1234567), "$1.234.567");
        assert_eq!(format_clp(-1500), "-$1.500");
    }

    #[test]
    fn nosotros_renders_without_data() {
        let response = render("nosotros.html", &page_context()).unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
