use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

use shelftier_core::AppConfig;

pub mod tiering;

pub use tiering::{fetch_sku_totals, fetch_tiering_rows, map_tiering_rows, table_for, TieringRow};

/// Pool sizing taken from `SHELFTIER_DB_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub max: u32,
    pub min: u32,
    pub acquire_timeout: Duration,
}

impl From<&AppConfig> for PoolSizing {
    fn from(config: &AppConfig) -> Self {
        Self {
            max: config.db_max_connections.max(1),
            min: config.db_min_connections.min(config.db_max_connections),
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Lazily connected pool over the tiering tables. Nothing is dialed until
/// the first query, so a down database does not block startup.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] when `DATABASE_URL` is unset and
/// [`DbError::Sqlx`] when the URL does not parse.
pub fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    let url = config
        .database_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or(DbError::MissingDatabaseUrl)?;
    let sizing = PoolSizing::from(config);
    tracing::debug!(max = sizing.max, min = sizing.min, "configuring tiering pool");
    let pool = PgPoolOptions::new()
        .max_connections(sizing.max)
        .min_connections(sizing.min)
        .acquire_timeout(sizing.acquire_timeout)
        .connect_lazy(url)?;
    Ok(pool)
}

/// Round-trips a trivial query; used by `GET /api/health`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_keeps_min_within_max() {
        let config = shelftier_core::build_app_config(|key| {
            let value = match key {
                "SHELFTIER_SOURCE" => "postgres",
                "DATABASE_URL" => "postgres://localhost/shelftier",
                "SHELFTIER_DB_MAX_CONNECTIONS" => "2",
                "SHELFTIER_DB_MIN_CONNECTIONS" => "5",
                "SHELFTIER_DB_ACQUIRE_TIMEOUT_SECS" => "4",
                _ => return Err(std::env::VarError::NotPresent),
            };
            Ok(value.to_string())
        })
        .expect("postgres config");

        let sizing = PoolSizing::from(&config);
        assert_eq!(sizing.max, 2);
        assert_eq!(sizing.min, 2);
        assert_eq!(sizing.acquire_timeout, Duration::from_secs(4));
    }

    #[test]
    fn missing_url_is_reported() {
        let config = shelftier_core::build_app_config(|key| match key {
            "SHELFTIER_SOURCE" => Ok("postgres".to_string()),
            "DATABASE_URL" => Ok("postgres://localhost/shelftier".to_string()),
            _ => Err(std::env::VarError::NotPresent),
        })
        .expect("postgres config");
        let config = AppConfig {
            database_url: Some("  ".to_string()),
            ..config
        };
        assert!(matches!(
            connect_pool_from_config(&config),
            Err(DbError::MissingDatabaseUrl)
        ));
    }
}
