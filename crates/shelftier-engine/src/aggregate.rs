//! Order records to per-product sales rows.
//!
//! Aggregation runs in two passes over the channel-filtered orders. The first
//! scans line items, accumulating rows and building a variant → bucket index.
//! The second, only when returns are netted, walks refunds and resolves their
//! buckets against that index without modifying it.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use shelftier_core::{
    round_money, AccountingPolicy, Channel, LineItem, OrderRecord, ProductSalesRow, Refund,
    VariantRef,
};

use crate::size::{SizeBucket, SizeClassifier};
use crate::window::SalesWindow;

pub const DEFAULT_POS_APP_NAME: &str = "Point of Sale";

#[derive(Debug)]
pub struct Aggregator {
    classifier: SizeClassifier,
    pos_app_names: HashSet<String>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(SizeClassifier::default(), [DEFAULT_POS_APP_NAME])
    }
}

impl Aggregator {
    pub fn new<I, S>(classifier: SizeClassifier, pos_app_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classifier,
            pos_app_names: pos_app_names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &SizeClassifier {
        &self.classifier
    }

    /// `Pos` when the originating app is a known point-of-sale app, else `Online`.
    #[must_use]
    pub fn order_channel(&self, order: &OrderRecord) -> Channel {
        match order.app_name.as_deref() {
            Some(app) if self.pos_app_names.contains(app) => Channel::Pos,
            _ => Channel::Online,
        }
    }

    /// Builds one row per product that received a qualifying line item (or a
    /// resolvable refund, when returns are netted).
    ///
    /// Rows appear in first-seen order. Quantities are not floored; returns
    /// that exceed in-window sales leave negative counts.
    #[must_use]
    pub fn aggregate(
        &self,
        orders: &[OrderRecord],
        channel: Channel,
        window: &SalesWindow,
        policy: &AccountingPolicy,
    ) -> Vec<ProductSalesRow> {
        let included: Vec<&OrderRecord> = orders
            .iter()
            .filter(|o| channel.includes(self.order_channel(o)))
            .collect();

        let mut rows = RowSet::default();
        let index = self.scan_line_items(&included, policy, &mut rows);

        if policy.net_of_returns {
            for order in &included {
                for refund in &order.refunds {
                    if policy.by_refund_date
                        && !refund.created_at.is_some_and(|at| window.contains(at))
                    {
                        tracing::trace!(order = %order.id, "refund outside window, skipped");
                        continue;
                    }
                    self.net_refund(order, refund, &index, policy, &mut rows);
                }
            }
        }

        tracing::debug!(
            orders = orders.len(),
            included = included.len(),
            products = rows.rows.len(),
            channel = %channel,
            "aggregated sales"
        );
        rows.rows
    }

    fn scan_line_items(
        &self,
        orders: &[&OrderRecord],
        policy: &AccountingPolicy,
        rows: &mut RowSet,
    ) -> HashMap<String, SizeBucket> {
        let mut index = HashMap::new();
        for order in orders {
            for line in &order.line_items {
                let Some(variant) = attributable(line.variant.as_ref()) else {
                    tracing::trace!(order = %order.id, "line item without product, skipped");
                    continue;
                };
                if !policy.sku_allowed(&variant.sku) {
                    continue;
                }
                let Some(bucket) = self.classifier.classify(&variant.sku, &variant.title).bucket()
                else {
                    tracing::trace!(sku = %variant.sku, title = %variant.title, "no size bucket, skipped");
                    continue;
                };

                let row = rows.entry(variant);
                add_quantity(row, bucket, i64::from(line.quantity));
                row.revenue = round_money(row.revenue + round_money(line.net_amount(order.taxes_included)));
                row.total_sales =
                    round_money(row.total_sales + round_money(line.total_amount(order.taxes_included)));

                if !variant.variant_id.is_empty() {
                    index.insert(variant.variant_id.clone(), bucket);
                }
            }
        }
        index
    }

    fn net_refund(
        &self,
        order: &OrderRecord,
        refund: &Refund,
        index: &HashMap<String, SizeBucket>,
        policy: &AccountingPolicy,
        rows: &mut RowSet,
    ) {
        for item in &refund.line_items {
            let Some(variant) = attributable(item.variant.as_ref()) else {
                continue;
            };
            if item.quantity == 0 {
                continue;
            }

            let indexed = (!variant.variant_id.is_empty())
                .then(|| index.get(&variant.variant_id).copied())
                .flatten();
            let bucket = match indexed {
                Some(bucket) => bucket,
                None => {
                    if !rows.contains(&variant.product_id) && !policy.sku_allowed(&variant.sku) {
                        tracing::debug!(
                            order = %order.id,
                            sku = %variant.sku,
                            "refund for unseen variant failed sku filter, not netted"
                        );
                        continue;
                    }
                    match self.classifier.classify(&variant.sku, &variant.title).bucket() {
                        Some(bucket) => bucket,
                        None => continue,
                    }
                }
            };

            let qty = Decimal::from(item.quantity);
            let row = rows.entry(variant);
            add_quantity(row, bucket, -i64::from(item.quantity));

            let (unit_net, unit_total) = unit_prices(order, variant);
            if unit_net > Decimal::ZERO {
                row.revenue = round_money(row.revenue - unit_net * qty);
            }
            if unit_total > Decimal::ZERO {
                row.total_sales = round_money(row.total_sales - unit_total * qty);
            }
        }
    }
}

/// Weighted-average unit net and total price of `variant` within `order`.
///
/// Lines match on variant id, or on SKU when the refunded variant has no id.
/// Returns zeros when nothing matches.
fn unit_prices(order: &OrderRecord, variant: &VariantRef) -> (Decimal, Decimal) {
    let matches = |line: &&LineItem| {
        let Some(v) = line.variant.as_ref() else {
            return false;
        };
        if variant.variant_id.is_empty() {
            !variant.sku.is_empty() && v.sku == variant.sku
        } else {
            v.variant_id == variant.variant_id
        }
    };

    let mut qty = Decimal::ZERO;
    let mut net = Decimal::ZERO;
    let mut total = Decimal::ZERO;
    for line in order.line_items.iter().filter(matches) {
        qty += Decimal::from(line.quantity);
        net += line.net_amount(order.taxes_included);
        total += line.total_amount(order.taxes_included);
    }
    if qty <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    (net / qty, total / qty)
}

fn attributable(variant: Option<&VariantRef>) -> Option<&VariantRef> {
    variant.filter(|v| !v.product_id.is_empty())
}

fn add_quantity(row: &mut ProductSalesRow, bucket: SizeBucket, qty: i64) {
    match bucket {
        SizeBucket::Size30 => row.qty30 += qty,
        SizeBucket::Size100 => row.qty100 += qty,
    }
}

/// Insertion-ordered rows keyed by product id.
#[derive(Default)]
struct RowSet {
    rows: Vec<ProductSalesRow>,
    positions: HashMap<String, usize>,
}

impl RowSet {
    fn contains(&self, product_id: &str) -> bool {
        self.positions.contains_key(product_id)
    }

    fn entry(&mut self, variant: &VariantRef) -> &mut ProductSalesRow {
        let pos = match self.positions.get(&variant.product_id) {
            Some(&pos) => pos,
            None => {
                let name = if variant.product_name.is_empty() {
                    variant.product_id.clone()
                } else {
                    variant.product_name.clone()
                };
                self.rows
                    .push(ProductSalesRow::new(variant.product_id.clone(), name));
                self.positions
                    .insert(variant.product_id.clone(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[pos];
        if row.name == row.product_id && !variant.product_name.is_empty() {
            row.name.clone_from(&variant.product_name);
        }
        row
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
