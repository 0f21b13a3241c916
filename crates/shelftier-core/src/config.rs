use crate::app_config::{AppConfig, Environment, SalesSource, ShopifySettings};
use crate::policy::{AccountingPolicy, DeltaBase, TimeField};
use crate::ConfigError;

const DEFAULT_QUERY_EXTRA: &str = "financial_status:paid -status:cancelled";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Does not read `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// # Errors
///
/// Returns `ConfigError` if required vars are missing or values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_flag = |var: &str| -> Result<bool, ConfigError> {
        match optional(var) {
            None => Ok(false),
            Some(raw) => parse_bool(&raw).ok_or_else(|| invalid(var, format!("not a boolean: {raw}"))),
        }
    };

    let env = parse_environment(&or_default("SHELFTIER_ENV", "development"));

    let bind_addr = or_default("SHELFTIER_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SHELFTIER_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("SHELFTIER_LOG_LEVEL", "info");
    let tiers_config_path = PathBuf::from(or_default(
        "SHELFTIER_TIERS_CONFIG_PATH",
        "./config/tiers.json",
    ));
    let admin_token = optional("SHELFTIER_ADMIN_TOKEN");

    let source = match or_default("SHELFTIER_SOURCE", "shopify")
        .to_ascii_lowercase()
        .as_str()
    {
        "shopify" => SalesSource::Shopify,
        "postgres" => SalesSource::Postgres,
        other => {
            return Err(invalid(
                "SHELFTIER_SOURCE",
                format!("expected shopify or postgres, got {other}"),
            ))
        }
    };

    let shopify = match source {
        SalesSource::Shopify => Some(ShopifySettings {
            store_domain: normalize_domain(&require("SHOPIFY_STORE_DOMAIN")?),
            admin_token: require("SHOPIFY_ADMIN_TOKEN")?,
            api_version: or_default("SHOPIFY_API_VERSION", "2024-07"),
            retry_max: parse_u32("SHOPIFY_GQL_RETRY_MAX", "6")?.max(1),
            min_delay_ms: parse_u64("SHOPIFY_GQL_MIN_DELAY_MS", "300")?,
            inter_delay_ms: parse_u64("SHOPIFY_GQL_INTER_DELAY_MS", "0")?,
            request_timeout_secs: parse_u64("SHOPIFY_REQUEST_TIMEOUT_SECS", "30")?,
        }),
        SalesSource::Postgres => None,
    };

    let database_url = match source {
        SalesSource::Postgres => Some(require("DATABASE_URL")?),
        SalesSource::Shopify => optional("DATABASE_URL"),
    };
    let db_max_connections = parse_u32("SHELFTIER_DB_MAX_CONNECTIONS", "3")?;
    let db_min_connections = parse_u32("SHELFTIER_DB_MIN_CONNECTIONS", "0")?;
    let db_acquire_timeout_secs = parse_u64("SHELFTIER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let time_field = or_default("SHELFTIER_ORDER_TIME_FIELD", "processed_at")
        .parse::<TimeField>()
        .map_err(|e| invalid("SHELFTIER_ORDER_TIME_FIELD", e.to_string()))?;

    let policy = AccountingPolicy {
        net_of_returns: parse_flag("SHELFTIER_NET_OF_RETURNS")?,
        by_refund_date: parse_flag("SHELFTIER_NET_RETURNS_BY_REFUND_DATE")?,
        time_field,
        extra_query: or_default("SHELFTIER_ORDER_QUERY_EXTRA", DEFAULT_QUERY_EXTRA),
        sku_prefix: optional("SHELFTIER_SKU_PREFIX").unwrap_or_default(),
    };

    let pos_app_names = or_default("SHELFTIER_POS_APP_NAMES", "Point of Sale")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let tz_offset_hours = or_default("SHELFTIER_TZ_OFFSET_HOURS", "-7")
        .parse::<i32>()
        .map_err(|e| invalid("SHELFTIER_TZ_OFFSET_HOURS", e.to_string()))?;
    if !(-12..=14).contains(&tz_offset_hours) {
        return Err(invalid(
            "SHELFTIER_TZ_OFFSET_HOURS",
            format!("offset {tz_offset_hours} outside -12..=14"),
        ));
    }

    let delta_base = or_default("SHELFTIER_DELTA_BASE", "anchor_start")
        .parse::<DeltaBase>()
        .map_err(|e| invalid("SHELFTIER_DELTA_BASE", e.to_string()))?;

    let http_cache_secs = parse_u64("SHELFTIER_HTTP_CACHE_SECS", "60")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        tiers_config_path,
        admin_token,
        source,
        shopify,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        policy,
        size30_pattern: optional("SHELFTIER_SIZE30_REGEX"),
        size100_pattern: optional("SHELFTIER_SIZE100_REGEX"),
        pos_app_names,
        tz_offset_hours,
        delta_base,
        http_cache_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Strips a scheme and trailing slashes from a shop domain.
fn normalize_domain(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
