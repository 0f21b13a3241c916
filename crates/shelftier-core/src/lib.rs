pub mod app_config;
pub mod config;
pub mod orders;
pub mod policy;
pub mod sales;
pub mod tiers_config;
pub mod tiers_store;

pub use app_config::{AppConfig, Environment, SalesSource, ShopifySettings};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use orders::{LineItem, OrderRecord, Refund, RefundLineItem, VariantRef};
pub use policy::{AccountingPolicy, DeltaBase, TimeField};
pub use sales::{round_money, AssignmentReason, Channel, ProductSalesRow, Tier, TierAssignment};
pub use tiers_config::{TiersConfig, TiersConfigInput, MAX_SALES_WINDOW_DAYS};
pub use tiers_store::TiersConfigStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
    #[error("invalid tier label: {0}")]
    InvalidTier(String),
    #[error("invalid time field: {0}")]
    InvalidTimeField(String),
    #[error("invalid delta base policy: {0}")]
    InvalidDeltaBase(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to access tiers config file {path}: {source}")]
    TiersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tiers config file: {0}")]
    TiersFileParse(#[from] serde_json::Error),

    #[error("tier thresholds must satisfy SS >= S >= A (got SS={ss}, S={s}, A={a})")]
    ThresholdOrder { ss: f64, s: f64, a: f64 },
}
