pub mod cart_item;
pub mod category;
pub mod customer;
pub mod image;
pub mod offer;
pub mod order;
pub mod order_line;
pub mod password_reset;
pub mod product;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema,
    Set,
};
use thiserror::Error;
use tracing::info;

use crate::config::AdminSeed;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to create schema: {0}")]
    Schema(#[from] DbErr),
    #[error("Failed to hash seed password: {0}")]
    PasswordHash(String),
}

/// Creates every table that is missing, parents before children.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), SetupError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(image::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(customer::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(offer::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_line::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(password_reset::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}

/// Makes sure the configured staff account exists.
pub async fn seed_admin(db: &DatabaseConnection, seed: &AdminSeed) -> Result<(), SetupError> {
    let email = customer::normalize_email(&seed.email);

    let existing = customer::Entity::find()
        .filter(customer::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = customer::hash_password(&seed.password)
        .map_err(|err| SetupError::PasswordHash(err.to_string()))?;

    let admin = customer::ActiveModel {
        name: Set(seed.name.clone()),
        email: Set(email.clone()),
        phone: Set(None),
        password: Set(password),
        registered_at: Set(Utc::now()),
        is_active: Set(true),
        is_staff: Set(true),
        is_superuser: Set(true),
        ..Default::default()
    };
    customer::Entity::insert(admin).exec(db).await?;
    info!(email = %email, "Created staff account");

    Ok(())
}
