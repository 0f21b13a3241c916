//! Exact-SKU totals for reconciling against storefront reports.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shelftier_core::{round_money, Channel, OrderRecord};

use crate::aggregate::Aggregator;

/// Attribution used for orders with no originating app.
pub const DEFAULT_APP_NAME: &str = "Online Store";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuTotals {
    pub qty: i64,
    pub net_sales: Decimal,
    pub total_sales: Decimal,
}

impl SkuTotals {
    fn add(&mut self, qty: u32, net: Decimal, total: Decimal) {
        self.qty += i64::from(qty);
        self.net_sales = round_money(self.net_sales + net);
        self.total_sales = round_money(self.total_sales + total);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuSummary {
    pub sku: String,
    #[serde(flatten)]
    pub totals: SkuTotals,
    pub by_app: BTreeMap<String, SkuTotals>,
}

/// Sums every line whose SKU equals `sku` exactly, overall and per app.
///
/// No size classification, prefix filter or returns netting is applied.
#[must_use]
pub fn summarize_sku(
    aggregator: &Aggregator,
    orders: &[OrderRecord],
    sku: &str,
    channel: Channel,
) -> SkuSummary {
    let mut summary = SkuSummary {
        sku: sku.to_string(),
        totals: SkuTotals::default(),
        by_app: BTreeMap::new(),
    };

    for order in orders
        .iter()
        .filter(|o| channel.includes(aggregator.order_channel(o)))
    {
        let app = order
            .app_name
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_APP_NAME);
        for line in &order.line_items {
            if line.variant.as_ref().is_none_or(|v| v.sku.trim() != sku) {
                continue;
            }
            let net = round_money(line.net_amount(order.taxes_included));
            let total = round_money(line.total_amount(order.taxes_included));
            summary.totals.add(line.quantity, net, total);
            summary
                .by_app
                .entry(app.to_string())
                .or_default()
                .add(line.quantity, net, total);
        }
    }
    summary
}
