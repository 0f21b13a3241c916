//! Order snapshots as handed to the aggregator by a data-source adapter.
//!
//! These records are ephemeral: fetched per request, never persisted, and
//! never mutated by the engine. Monetary amounts are [`Decimal`] so that
//! adapters can pass Shopify's decimal strings through without float drift.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TimeField;

/// The variant a line item (or refunded line item) points at.
///
/// Empty strings stand in for absent values; adapters trim whitespace before
/// constructing this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRef {
    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub sku: String,
    /// Variant display title, e.g. `"100 ml"`.
    #[serde(default)]
    pub title: String,
    /// Owning product identifier. Empty when the variant has no product.
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub quantity: u32,
    /// Line total after discounts. Tax-inclusive when the parent order's
    /// `taxes_included` flag is set.
    pub amount: Decimal,
    /// Itemized tax amounts for this line.
    #[serde(default)]
    pub tax_lines: Vec<Decimal>,
    #[serde(default)]
    pub variant: Option<VariantRef>,
}

impl LineItem {
    #[must_use]
    pub fn tax_total(&self) -> Decimal {
        self.tax_lines.iter().copied().sum()
    }

    /// Line revenue with taxes removed, floored at zero.
    #[must_use]
    pub fn net_amount(&self, taxes_included: bool) -> Decimal {
        if taxes_included {
            (self.amount - self.tax_total()).max(Decimal::ZERO)
        } else {
            self.amount
        }
    }

    /// Line revenue with taxes included.
    #[must_use]
    pub fn total_amount(&self, taxes_included: bool) -> Decimal {
        if taxes_included {
            self.amount
        } else {
            self.amount + self.tax_total()
        }
    }
}

/// A refunded line. Carries no monetary amount; the unit price is
/// reconstructed from the parent order's line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineItem {
    pub quantity: u32,
    #[serde(default)]
    pub variant: Option<VariantRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<RefundLineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub taxes_included: bool,
    /// Name of the app the order originated from (e.g. `"Point of Sale"`).
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
}

impl OrderRecord {
    /// The timestamp an upstream fetch would filter on. `processed_at`
    /// falls back to `created_at` when the order was never processed.
    #[must_use]
    pub fn timestamp(&self, field: TimeField) -> Option<DateTime<Utc>> {
        match field {
            TimeField::CreatedAt => self.created_at,
            TimeField::ProcessedAt => self.processed_at.or(self.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(amount: i64, taxes: &[i64]) -> LineItem {
        LineItem {
            quantity: 1,
            amount: Decimal::new(amount, 2),
            tax_lines: taxes.iter().map(|t| Decimal::new(*t, 2)).collect(),
            variant: None,
        }
    }

    #[test]
    fn net_amount_strips_taxes_when_included() {
        let li = line(12_000, &[1_500, 500]);
        assert_eq!(li.net_amount(true), Decimal::new(10_000, 2));
        assert_eq!(li.total_amount(true), Decimal::new(12_000, 2));
    }

    #[test]
    fn net_amount_is_floored_at_zero() {
        let li = line(100, &[250]);
        assert_eq!(li.net_amount(true), Decimal::ZERO);
    }

    #[test]
    fn total_amount_adds_taxes_when_excluded() {
        let li = line(10_000, &[800]);
        assert_eq!(li.net_amount(false), Decimal::new(10_000, 2));
        assert_eq!(li.total_amount(false), Decimal::new(10_800, 2));
    }

    #[test]
    fn order_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "id": "gid://shopify/Order/1",
            "lineItems": [{ "quantity": 2, "amount": "19.90" }]
        }"#;
        let order: OrderRecord = serde_json::from_str(json).expect("valid order json");
        assert!(!order.taxes_included);
        assert!(order.app_name.is_none());
        assert!(order.refunds.is_empty());
        assert_eq!(order.line_items[0].amount, Decimal::new(1990, 2));
        assert!(order.line_items[0].variant.is_none());
    }
}
