use anyhow::{Context, Result};
use condor_core::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Opens a `PostgreSQL` pool and applies the embedded migrations.
///
/// # Errors
/// Returns an error if the connection cannot be established or a migration fails.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await
        .context("connecting to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running ic_signals migrations")?;

    tracing::info!(max_connections, "Database ready");
    Ok(pool)
}

/// Connects using the `[database]` settings; `Ok(None)` when no URL is configured.
///
/// # Errors
/// Returns an error if a URL is configured but connecting fails.
pub async fn connect_configured(config: &DatabaseConfig) -> Result<Option<PgPool>> {
    match config.url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => Ok(Some(connect(url, config.max_connections).await?)),
        None => Ok(None),
    }
}
