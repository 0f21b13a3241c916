//! Argument groups shared by the report commands.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use shelftier_core::{AccountingPolicy, TiersConfig, TiersConfigStore, TimeField};
use shelftier_engine::{days_ending_on, trailing_days, Aggregator, SalesWindow, SizeClassifier};

#[derive(Debug, Args)]
pub(crate) struct WindowArgs {
    /// Window start (RFC 3339, inclusive). Requires --to.
    #[arg(long, requires = "to")]
    pub from: Option<DateTime<Utc>>,

    /// Window end (RFC 3339, exclusive). Requires --from.
    #[arg(long, requires = "from")]
    pub to: Option<DateTime<Utc>>,

    /// Trailing local days; defaults to the tiers config `salesWindowDays`.
    #[arg(long, value_parser = parse_positive::<u32>)]
    pub days: Option<u32>,

    /// Last local day of a trailing window. Defaults to yesterday.
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub until: Option<NaiveDate>,

    #[arg(
        long,
        env = "SHELFTIER_TZ_OFFSET_HOURS",
        default_value_t = -7,
        allow_hyphen_values = true
    )]
    pub tz_offset_hours: i32,
}

impl WindowArgs {
    /// Explicit bounds win; otherwise `days` local days ending on `until`,
    /// or on the last completed local day.
    pub(crate) fn resolve(
        &self,
        now: DateTime<Utc>,
        default_days: u32,
    ) -> anyhow::Result<SalesWindow> {
        let days = self.days.unwrap_or(default_days);
        let window = match (self.from, self.to, self.until) {
            (Some(from), Some(to), _) => SalesWindow::new(from, to)?,
            (_, _, Some(until)) => days_ending_on(until, days, self.tz_offset_hours)?,
            _ => trailing_days(now, days, true, self.tz_offset_hours)?,
        };
        Ok(window)
    }
}

#[derive(Debug, Args)]
pub(crate) struct PolicyArgs {
    /// Subtract refunded units and revenue.
    #[arg(long, env = "SHELFTIER_NET_OF_RETURNS")]
    pub net: bool,

    /// Count refunds by their own date instead of the order's.
    #[arg(long, env = "SHELFTIER_NET_RETURNS_BY_REFUND_DATE")]
    pub by_refund_date: bool,

    #[arg(long, env = "SHELFTIER_ORDER_TIME_FIELD", default_value = "processed_at")]
    pub time_field: TimeField,

    #[arg(long, env = "SHELFTIER_SKU_PREFIX", default_value = "")]
    pub sku_prefix: String,

    /// App names treated as point-of-sale (comma-separated).
    #[arg(
        long = "pos-app",
        env = "SHELFTIER_POS_APP_NAMES",
        value_delimiter = ',',
        default_value = "Point of Sale"
    )]
    pub pos_app_names: Vec<String>,

    #[arg(long, env = "SHELFTIER_SIZE30_REGEX")]
    pub size30_regex: Option<String>,

    #[arg(long, env = "SHELFTIER_SIZE100_REGEX")]
    pub size100_regex: Option<String>,
}

impl PolicyArgs {
    pub(crate) fn policy(&self) -> AccountingPolicy {
        AccountingPolicy {
            net_of_returns: self.net,
            by_refund_date: self.by_refund_date,
            time_field: self.time_field,
            extra_query: String::new(),
            sku_prefix: self.sku_prefix.clone(),
        }
    }

    pub(crate) fn aggregator(&self) -> Aggregator {
        let classifier = SizeClassifier::from_patterns(
            self.size30_regex.as_deref(),
            self.size100_regex.as_deref(),
        );
        Aggregator::new(classifier, self.pos_app_names.iter().map(|s| s.trim().to_string()))
    }
}

#[derive(Debug, Args)]
pub(crate) struct TiersArgs {
    /// Tiers config JSON. A missing file yields the defaults.
    #[arg(long = "config", env = "SHELFTIER_TIERS_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,
}

impl TiersArgs {
    pub(crate) fn load(&self) -> anyhow::Result<TiersConfig> {
        let Some(path) = &self.config_path else {
            return Ok(TiersConfig::default());
        };
        TiersConfigStore::new(path)
            .read()
            .with_context(|| format!("loading tiers config from {}", path.display()))
    }
}

pub(crate) fn parse_positive<T>(raw: &str) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    match raw.trim().parse::<T>() {
        Ok(n) if n >= T::from(1) => Ok(n),
        _ => Err(format!("expected a positive integer, got {raw:?}")),
    }
}
