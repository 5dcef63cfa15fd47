use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::customer::{self, hash_password, normalize_email, Entity as CustomerEntity};
use crate::middleware::{
    auth::Claims,
    cart_session::customer_key,
    logging::{message, ok, ApiError, HandlerError, HandlerResult},
};
use crate::shop::cart;

// ROUTERS
pub fn admin_customer_router() -> Router {
    Router::new()
        .route("/customer", get(get_customers).post(create_customer))
        .route(
            "/customer/:id",
            patch(patch_customer).delete(admin_delete_customer),
        )
}

// ROUTES
async fn get_customers(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<CustomersQuery>,
) -> HandlerResult {
    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };

    let sort_customers = match query.sort_by.as_deref() {
        Some("name") => customer::Column::Name,
        Some("email") => customer::Column::Email,
        Some("registered_at") => customer::Column::RegisteredAt,
        _ => customer::Column::Id,
    };

    let mut customer_finder = CustomerEntity::find();

    if let Some(is_staff) = query.is_staff {
        customer_finder = customer_finder.filter(customer::Column::IsStaff.eq(is_staff));
    }

    if let Some(query) = query.query {
        let mut query_condition = Condition::any()
            .add(customer::Column::Name.contains(&query))
            .add(customer::Column::Email.contains(&query));
        if let Ok(id) = query.parse::<i32>() {
            query_condition = query_condition.add(customer::Column::Id.eq(id));
        }
        customer_finder = customer_finder.filter(query_condition);
    }

    let customers: Vec<AdminCustomerResponse> = customer_finder
        .order_by(sort_customers, order)
        .select_only() //to select specific columns
        .column(customer::Column::Id)
        .column(customer::Column::Name)
        .column(customer::Column::Email)
        .column(customer::Column::Phone)
        .column(customer::Column::RegisteredAt)
        .column(customer::Column::IsActive)
        .column(customer::Column::IsStaff)
        .column(customer::Column::IsSuperuser)
        .into_model::<AdminCustomerResponse>()
        .all(&txn)
        .await?;

    Ok(ok(Json(customers)))
}

async fn create_customer(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCustomer>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let password = hash_password(&payload.password)
        .map_err(|err| HandlerError::internal(ApiError::PasswordHashFailed(err.to_string())))?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let is_superuser = payload.is_superuser.unwrap_or(false);
    let model = customer::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        email: Set(normalize_email(&payload.email)),
        phone: Set(payload.phone.filter(|phone| !phone.trim().is_empty())),
        password: Set(password),
        registered_at: Set(Utc::now()),
        is_active: Set(payload.is_active.unwrap_or(true)),
        // Superusers are always staff.
        is_staff: Set(payload.is_staff.unwrap_or(false) || is_superuser),
        is_superuser: Set(is_superuser),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| HandlerError::conflict("Email already registered", err))?;
    txn.commit().await?;

    Ok(ok((
        StatusCode::CREATED,
        Json(AdminCustomerResponse::from(model)),
    )))
}

async fn patch_customer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCustomer>,
) -> HandlerResult {
    payload.validate().map_err(HandlerError::validation)?;

    let password = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()
        .map_err(|err| HandlerError::internal(ApiError::PasswordHashFailed(err.to_string())))?;

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = CustomerEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No customer with {} id was found.", id)))?;

    let mut model: customer::ActiveModel = found.into();
    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_owned());
    }
    if let Some(email) = payload.email {
        model.email = Set(normalize_email(&email));
    }
    if let Some(phone) = payload.phone {
        let phone = phone.trim().to_owned();
        model.phone = Set((!phone.is_empty()).then_some(phone));
    }
    if let Some(password) = password {
        model.password = Set(password);
    }
    if let Some(is_active) = payload.is_active {
        model.is_active = Set(is_active);
    }
    if let Some(is_staff) = payload.is_staff {
        model.is_staff = Set(is_staff);
    }
    if let Some(is_superuser) = payload.is_superuser {
        model.is_superuser = Set(is_superuser);
        if is_superuser {
            model.is_staff = Set(true);
        }
    }

    //DB Failed / unique constraint
    let model = model
        .update(&txn)
        .await
        .map_err(|err| HandlerError::conflict("Email already registered", err))?;
    txn.commit().await?;

    Ok(ok(Json(AdminCustomerResponse::from(model))))
}

/// Orders survive as guest orders; the customer's cart is dropped.
async fn admin_delete_customer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult {
    if claims.customer_id == id {
        return Err(HandlerError::bad_request("You cannot delete your own account"));
    }

    let txn = db.begin().await.map_err(|_| HandlerError::transaction())?;

    let found = CustomerEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("No customer with {} id was found.", id)))?;

    cart::clear(&txn, &customer_key(found.id)).await?;
    CustomerEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    info!(customer_id = id, deleted_by = claims.customer_id, "Customer deleted");

    Ok(message(StatusCode::OK, "Resource deleted successfully."))
}

// STRUCTS
#[derive(Deserialize, Validate)]
struct CreateCustomer {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(max = 20))]
    phone: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    is_active: Option<bool>,
    is_staff: Option<bool>,
    is_superuser: Option<bool>,
}

#[derive(Deserialize, Validate)]
struct PatchCustomer {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(max = 20))]
    phone: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: Option<String>,
    is_active: Option<bool>,
    is_staff: Option<bool>,
    is_superuser: Option<bool>,
}

#[derive(Deserialize)]
struct CustomersQuery {
    query: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
    is_staff: Option<bool>,
}

#[derive(Serialize, FromQueryResult)]
struct AdminCustomerResponse {
    id: i32,
    name: String,
    email: String,
    phone: Option<String>,
    registered_at: chrono::DateTime<Utc>,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
}

impl From<customer::Model> for AdminCustomerResponse {
    fn from(value: customer::Model) -> Self {
        AdminCustomerResponse {
            id: value.id,
            name: value.name,
            email: value.email,
            phone: value.phone,
            registered_at: value.registered_at,
            is_active: value.is_active,
            is_staff: value.is_staff,
            is_superuser: value.is_superuser,
        }
    }
}
