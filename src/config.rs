use std::{env, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub secret: String,
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    pub file_size_limit: usize,
    pub access_token_hours: i64,
    pub refresh_token_days: i64,
    pub password_reset_minutes: i64,
    pub admin: Option<AdminSeed>,
}

/// Staff account created on start-up when it does not exist yet.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrador".to_owned()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            secret: required("SECRET")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned()),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            file_size_limit: parsed("FILE_SIZE_LIMIT", 5 * 1024 * 1024)?,
            access_token_hours: parsed("ACCESS_TOKEN_HOURS", 24)?,
            refresh_token_days: parsed("REFRESH_TOKEN_DAYS", 7)?,
            password_reset_minutes: parsed("PASSWORD_RESET_MINUTES", 60)?,
            admin,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
