//! Reads for the pre-aggregated `tiering_*` tables.
//!
//! These tables hold a fixed trailing lookback maintained outside this
//! service; the requested window is not applied to them. Bucket assignment
//! comes from the SKU suffix (`-30` / `-100`) after stripping the configured
//! prefix.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use shelftier_core::{round_money, Channel, ProductSalesRow, Tier};
use shelftier_engine::{SkuSummary, SkuTotals};
use sqlx::PgPool;

use crate::DbError;

static SUFFIX_30: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)-30$").expect("valid regex"));
static SUFFIX_100: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-100$").expect("valid regex"));

const SELECT_COLUMNS: &str = "SELECT sku, product_title, participation_pct::float8 AS participation_pct, \
     tier, three_weeks_units::bigint AS three_weeks_units, \
     revenue_gross::numeric AS revenue_gross, rank::int4 AS rank";

/// A row from one of the `tiering_pos` / `tiering_online` / `tiering_global` tables.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct TieringRow {
    pub sku: Option<String>,
    pub product_title: Option<String>,
    pub participation_pct: Option<f64>,
    pub tier: Option<String>,
    pub three_weeks_units: Option<i64>,
    pub revenue_gross: Option<Decimal>,
    pub rank: Option<i32>,
}

/// Table holding the pre-aggregated rows for `channel`.
#[must_use]
pub fn table_for(channel: Channel) -> &'static str {
    match channel {
        Channel::Pos => "public.tiering_pos",
        Channel::Online => "public.tiering_online",
        Channel::Total => "public.tiering_global",
    }
}

fn strip_prefix<'a>(sku: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        sku
    } else {
        sku.strip_prefix(prefix).unwrap_or(sku)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// Maps table rows onto engine sales rows.
///
/// Rows whose SKU carries neither size suffix, or whose unit count is zero,
/// are dropped. Rows resolving to the same product id are merged; the first
/// row's share, tier and rank are kept.
#[must_use]
pub fn map_tiering_rows(rows: Vec<TieringRow>, sku_prefix: &str) -> Vec<ProductSalesRow> {
    let mut out: Vec<ProductSalesRow> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for r in rows {
        let raw_sku = r.sku.as_deref().unwrap_or_default().trim();
        let title = r.product_title.as_deref().unwrap_or_default().trim();
        let stripped = strip_prefix(raw_sku, sku_prefix);
        let qty = r.three_weeks_units.unwrap_or(0);

        let (qty30, qty100) = if SUFFIX_30.is_match(stripped) {
            (qty, 0)
        } else if SUFFIX_100.is_match(stripped) {
            (0, qty)
        } else {
            (0, 0)
        };
        if qty30 <= 0 && qty100 <= 0 {
            continue;
        }

        let product_id = non_empty(stripped)
            .or(non_empty(raw_sku))
            .or(non_empty(title))
            .unwrap_or("UNKNOWN");
        let revenue = round_money(r.revenue_gross.unwrap_or(Decimal::ZERO));

        if let Some(&i) = index.get(product_id) {
            let row = &mut out[i];
            row.qty30 += qty30;
            row.qty100 += qty100;
            row.revenue = round_money(row.revenue + revenue);
            row.total_sales = round_money(row.total_sales + revenue);
            continue;
        }

        let name = non_empty(title).unwrap_or(product_id);
        let mut row = ProductSalesRow::new(product_id, name);
        row.qty30 = qty30;
        row.qty100 = qty100;
        row.revenue = revenue;
        row.total_sales = revenue;
        row.share_pct = r.participation_pct.filter(|p| p.is_finite());
        row.source_tier = r.tier.as_deref().and_then(|t| t.parse::<Tier>().ok());
        row.source_rank = r.rank.and_then(|n| u32::try_from(n).ok());
        index.insert(product_id.to_string(), out.len());
        out.push(row);
    }
    out
}

/// Loads and maps every row of the channel's tiering table.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_tiering_rows(
    pool: &PgPool,
    channel: Channel,
    sku_prefix: &str,
) -> Result<Vec<ProductSalesRow>, DbError> {
    let table = table_for(channel);
    let sql = format!("{SELECT_COLUMNS} FROM {table}");
    let rows = sqlx::query_as::<_, TieringRow>(&sql)
        .fetch_all(pool)
        .await?;
    tracing::debug!(table, rows = rows.len(), "loaded tiering rows");
    Ok(map_tiering_rows(rows, sku_prefix))
}

/// Totals for one exact SKU from the channel's tiering table. The tables
/// carry no per-app split, so `by_app` is always empty.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_sku_totals(
    pool: &PgPool,
    channel: Channel,
    sku: &str,
) -> Result<SkuSummary, DbError> {
    let sql = format!("{SELECT_COLUMNS} FROM {} WHERE sku = $1", table_for(channel));
    let row = sqlx::query_as::<_, TieringRow>(&sql)
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(sku_summary(sku, row))
}

fn sku_summary(sku: &str, row: Option<TieringRow>) -> SkuSummary {
    let totals = row.map_or_else(SkuTotals::default, |r| {
        let revenue = round_money(r.revenue_gross.unwrap_or(Decimal::ZERO));
        SkuTotals {
            qty: r.three_weeks_units.unwrap_or(0),
            net_sales: revenue,
            total_sales: revenue,
        }
    });
    SkuSummary {
        sku: sku.to_string(),
        totals,
        by_app: BTreeMap::new(),
    }
}
