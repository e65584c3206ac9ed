use common::error::{AppError, Res};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgSslMode},
};
use std::{str::FromStr, sync::Arc};

pub mod migrations;
pub mod models;
pub mod repository;

pub mod category;
pub mod company;
pub mod order_detail;
pub mod order_header;
pub mod product;
pub mod role;
pub mod shopping_cart;
pub mod user;

pub use repository::{Filter, UnitOfWork};

/// Connects to the database, creating it first when missing, and applies
/// pending migrations.
pub async fn setup(database_url: &str, require_ssl: bool) -> Res<Arc<PgPool>> {
    let url = url::Url::parse(database_url)
        .map_err(|e| AppError::Config(format!("Invalid DATABASE_URL: {}", e)))?;
    let db_name = url.path().trim_start_matches('/');
    let username = url.username();
    let password = url.password().unwrap_or("");
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(5432);

    let admin_url = format!(
        "postgresql://{}:{}@{}:{}/postgres",
        username, password, host, port
    );

    let mut admin_options = PgConnectOptions::from_str(&admin_url)?;
    if require_ssl {
        admin_options = admin_options.ssl_mode(PgSslMode::Require);
    }

    let admin_pool = PgPool::connect_with(admin_options).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("Creating database {}", db_name);
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&admin_pool)
            .await?;
    }

    admin_pool.close().await;

    let mut options = PgConnectOptions::from_str(database_url)?;
    if require_ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    let pool = PgPool::connect_with(options).await?;

    let applied = migrations::Migrator::default().apply_pending(&pool).await?;
    for id in applied {
        log::info!("Migration {} applied at startup", id);
    }

    Ok(Arc::new(pool))
}
