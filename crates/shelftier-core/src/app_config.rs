use std::net::SocketAddr;
use std::path::PathBuf;

use crate::policy::{AccountingPolicy, DeltaBase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where the server reads sales from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesSource {
    /// Raw orders from the Shopify Admin GraphQL API.
    Shopify,
    /// Pre-aggregated tiering tables in Postgres.
    Postgres,
}

impl std::fmt::Display for SalesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SalesSource::Shopify => write!(f, "shopify"),
            SalesSource::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Clone)]
pub struct ShopifySettings {
    /// Bare shop domain, e.g. `example.myshopify.com`.
    pub store_domain: String,
    pub admin_token: String,
    pub api_version: String,
    pub retry_max: u32,
    pub min_delay_ms: u64,
    /// Pause between successive page requests.
    pub inter_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl ShopifySettings {
    /// GraphQL endpoint for the configured shop and API version.
    #[must_use]
    pub fn graphql_url(&self) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            self.store_domain, self.api_version
        )
    }
}

impl std::fmt::Debug for ShopifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifySettings")
            .field("store_domain", &self.store_domain)
            .field("admin_token", &"[redacted]")
            .field("api_version", &self.api_version)
            .field("retry_max", &self.retry_max)
            .field("min_delay_ms", &self.min_delay_ms)
            .field("inter_delay_ms", &self.inter_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub tiers_config_path: PathBuf,
    pub admin_token: Option<String>,
    pub source: SalesSource,
    pub shopify: Option<ShopifySettings>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Default accounting policy; requests may override individual flags.
    pub policy: AccountingPolicy,
    pub size30_pattern: Option<String>,
    pub size100_pattern: Option<String>,
    pub pos_app_names: Vec<String>,
    /// Fixed UTC offset used for local-day window boundaries.
    pub tz_offset_hours: i32,
    pub delta_base: DeltaBase,
    pub http_cache_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("tiers_config_path", &self.tiers_config_path)
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[redacted]"),
            )
            .field("source", &self.source)
            .field("shopify", &self.shopify)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("policy", &self.policy)
            .field("size30_pattern", &self.size30_pattern)
            .field("size100_pattern", &self.size100_pattern)
            .field("pos_app_names", &self.pos_app_names)
            .field("tz_offset_hours", &self.tz_offset_hours)
            .field("delta_base", &self.delta_base)
            .field("http_cache_secs", &self.http_cache_secs)
            .finish()
    }
}
