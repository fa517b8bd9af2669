use std::env;

use log::{info, warn};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

pub struct Config {
    pub database_url: String,
    pub jwt_secret: Vec<u8>,
    pub media_root: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            database_url: required("DATABASE_URL"),
            jwt_secret: required("JWT_SECRET").into_bytes(),
            media_root: try_load("MEDIA_ROOT", "media"),
        }
    }
}

fn required(key: &str) -> String {
    env::var(key)
        .map_err(|_| {
            warn!("Environment variable {key} not found");
        })
        .expect("Environment misconfigured!")
}

fn try_load(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

pub async fn connect(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
