//! Ranked, filtered and paginated summaries with period-over-period deltas.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use shelftier_core::{
    AccountingPolicy, AssignmentReason, Channel, OrderRecord, ProductSalesRow, Tier,
    TierAssignment, TiersConfig,
};

use crate::aggregate::Aggregator;
use crate::error::EngineError;
use crate::tiering::assign_tiers;
use crate::window::SalesWindow;

/// What a data source hands back for one window.
#[derive(Debug, Clone)]
pub enum SalesInput {
    /// Raw orders, aggregated by the engine.
    Orders(Vec<OrderRecord>),
    /// Rows already aggregated upstream; aggregation is bypassed.
    Aggregated(Vec<ProductSalesRow>),
}

/// A product row with its engine-assigned tier and unfiltered rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRow {
    #[serde(flatten)]
    pub row: ProductSalesRow,
    pub tier: Tier,
    pub reason: AssignmentReason,
    pub rank: u32,
}

impl RankedRow {
    #[must_use]
    pub fn share_pct(&self) -> f64 {
        self.row.share_pct.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    #[serde(flatten)]
    pub row: ProductSalesRow,
    pub tier: Tier,
    pub rank: u32,
    pub delta_share_pct: f64,
}

/// Reduced per-channel row used for breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlimRow {
    pub product_id: String,
    pub name: String,
    pub qty30: i64,
    pub qty100: i64,
    pub revenue: Decimal,
}

impl From<&RankedRow> for SlimRow {
    fn from(ranked: &RankedRow) -> Self {
        Self {
            product_id: ranked.row.product_id.clone(),
            name: ranked.row.name.clone(),
            qty30: ranked.row.qty30,
            qty100: ranked.row.qty100,
            revenue: ranked.row.revenue,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryQuery {
    /// Keep only rows whose tier is listed. Empty keeps everything.
    pub tiers: Vec<Tier>,
    /// Case- and accent-insensitive substring match on the product name.
    pub search: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
    /// Row count after filtering, before pagination.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub config_version: u64,
    pub window: SalesWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_window: Option<SalesWindow>,
}

/// Binds the aggregator and tier engine for one request.
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'a> {
    pub aggregator: &'a Aggregator,
    pub config: &'a TiersConfig,
    pub policy: &'a AccountingPolicy,
    pub now: DateTime<Utc>,
}

impl Orchestrator<'_> {
    /// Produces sales rows for one window without attaching shares.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateProduct`] when pre-aggregated input
    /// repeats a product id.
    pub fn sales_rows(
        &self,
        input: SalesInput,
        channel: Channel,
        window: &SalesWindow,
    ) -> Result<Vec<ProductSalesRow>, EngineError> {
        match input {
            SalesInput::Orders(orders) => Ok(self
                .aggregator
                .aggregate(&orders, channel, window, self.policy)),
            SalesInput::Aggregated(rows) => dedupe_checked(rows),
        }
    }

    /// Rows for one window with revenue shares, tiers and rank, ordered by rank.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::sales_rows`].
    pub fn ranked_rows(
        &self,
        input: SalesInput,
        channel: Channel,
        window: &SalesWindow,
    ) -> Result<Vec<RankedRow>, EngineError> {
        let mut rows = self.sales_rows(input, channel, window)?;
        attach_revenue_shares(&mut rows);
        let tiers = assign_tiers_by_id(&rows, self.config, self.now);
        Ok(rank(rows, &tiers))
    }

    /// Tier assignments using the quantity-share rule for rows without a
    /// share of their own.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::sales_rows`].
    pub fn recalculate(
        &self,
        input: SalesInput,
        channel: Channel,
        window: &SalesWindow,
    ) -> Result<Vec<TierAssignment>, EngineError> {
        let rows = self.sales_rows(input, channel, window)?;
        Ok(assign_tiers(&rows, self.config, self.now))
    }

    /// Merges the current window with an optional previous window.
    ///
    /// Without a previous window every delta is zero.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPagination`] for a zero page or page size.
    pub fn summarize(
        &self,
        current: Vec<RankedRow>,
        previous: Option<&[RankedRow]>,
        window: SalesWindow,
        previous_window: Option<SalesWindow>,
        query: &SummaryQuery,
    ) -> Result<Summary, EngineError> {
        if query.page == 0 || query.page_size == 0 {
            return Err(EngineError::InvalidPagination {
                page: query.page,
                page_size: query.page_size,
            });
        }

        let previous_shares: Option<HashMap<&str, f64>> = previous.map(|rows| {
            rows.iter()
                .map(|r| (r.row.product_id.as_str(), r.share_pct()))
                .collect()
        });

        let tier_filter: HashSet<Tier> = query.tiers.iter().copied().collect();
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(fold);

        let filtered: Vec<RankedRow> = current
            .into_iter()
            .filter(|r| tier_filter.is_empty() || tier_filter.contains(&r.tier))
            .filter(|r| needle.as_ref().is_none_or(|n| fold(&r.row.name).contains(n.as_str())))
            .collect();
        let total = filtered.len();

        let rows = filtered
            .into_iter()
            .skip((query.page - 1).saturating_mul(query.page_size))
            .take(query.page_size)
            .map(|r| {
                let delta_share_pct = previous_shares.as_ref().map_or(0.0, |prev| {
                    let before = prev.get(r.row.product_id.as_str()).copied().unwrap_or(0.0);
                    round4(r.share_pct() - before)
                });
                SummaryRow {
                    row: r.row,
                    tier: r.tier,
                    rank: r.rank,
                    delta_share_pct,
                }
            })
            .collect();

        Ok(Summary {
            rows,
            total,
            page: query.page,
            page_size: query.page_size,
            config_version: self.config.config_version,
            window,
            previous_window,
        })
    }
}

/// Sets every row's share from revenue, or from quantity when total revenue
/// is zero. A zero denominator is treated as 1. Existing shares are replaced.
pub fn attach_revenue_shares(rows: &mut [ProductSalesRow]) {
    let revenue_total: Decimal = rows.iter().map(|r| r.revenue).sum();
    if revenue_total > Decimal::ZERO {
        let denominator = revenue_total.to_f64().unwrap_or(1.0);
        for row in rows.iter_mut() {
            let revenue = row.revenue.to_f64().unwrap_or(0.0);
            row.share_pct = Some(revenue * 100.0 / denominator);
        }
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let denominator = rows.iter().map(ProductSalesRow::total_qty).sum::<i64>().max(1) as f64;
    for row in rows.iter_mut() {
        #[allow(clippy::cast_precision_loss)]
        let qty = row.total_qty() as f64;
        row.share_pct = Some(qty * 100.0 / denominator);
    }
}

fn assign_tiers_by_id(
    rows: &[ProductSalesRow],
    config: &TiersConfig,
    now: DateTime<Utc>,
) -> HashMap<String, (Tier, AssignmentReason)> {
    assign_tiers(rows, config, now)
        .into_iter()
        .map(|a| (a.product_id, (a.tier, a.reason)))
        .collect()
}

/// Stable descending sort by share, then 1-based rank.
fn rank(
    mut rows: Vec<ProductSalesRow>,
    tiers: &HashMap<String, (Tier, AssignmentReason)>,
) -> Vec<RankedRow> {
    rows.sort_by(|a, b| {
        b.share_pct
            .unwrap_or(0.0)
            .total_cmp(&a.share_pct.unwrap_or(0.0))
    });
    rows.into_iter()
        .zip(1u32..)
        .map(|(row, rank)| {
            let (tier, reason) = tiers
                .get(&row.product_id)
                .copied()
                .unwrap_or((Tier::C, AssignmentReason::Baseline));
            RankedRow {
                row,
                tier,
                reason,
                rank,
            }
        })
        .collect()
}

fn dedupe_checked(rows: Vec<ProductSalesRow>) -> Result<Vec<ProductSalesRow>, EngineError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.product_id.is_empty() {
            tracing::debug!(name = %row.name, "pre-aggregated row without product id, skipped");
            continue;
        }
        if !seen.insert(row.product_id.clone()) {
            return Err(EngineError::DuplicateProduct(row.product_id));
        }
        out.push(row);
    }
    Ok(out)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Lowercases and strips diacritics from common Latin letters.
#[must_use]
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
            'ď' | 'đ' => 'd',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
            'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
            'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
            'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
            'ŕ' | 'ř' => 'r',
            'ś' | 'ŝ' | 'ş' | 'š' => 's',
            'ţ' | 'ť' => 't',
            'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
            'ý' | 'ÿ' => 'y',
            'ź' | 'ż' | 'ž' => 'z',
            other => other,
        })
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}

#[cfg(test)]
#[path = "summary_test.rs"]
mod tests;
