use sea_orm::{ConnectOptions, Database, DbErr};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tres_en_uno::api::create_api_router;
use tres_en_uno::config::{Config, ConfigError};
use tres_en_uno::entities::{seed_admin, setup_schema, SetupError};

#[derive(Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to connect to the database: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(10)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    setup_schema(&db).await?;
    if let Some(admin) = &config.admin {
        seed_admin(&db, admin).await?;
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    let app = create_api_router(Arc::new(db), Arc::new(config));
    axum::serve(listener, app).await?;

    Ok(())
}
