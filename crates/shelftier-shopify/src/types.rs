//! Admin GraphQL response shapes for the orders query.
//!
//! Every field the query selects is optional on the wire: deleted variants
//! come back as `null`, POS orders may lack an `app`, and money amounts are
//! decimal strings. Nodes are deserialized leniently and validated during
//! normalization.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Envelope of every GraphQL response.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

impl GraphQlError {
    /// `true` for Shopify's cost-based throttling error.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|c| c == "THROTTLED")
            || self.message.to_ascii_lowercase().contains("throttled")
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    #[serde(default)]
    pub cursor: Option<String>,
    pub node: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrdersData {
    pub orders: Connection<OrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNode {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub taxes_included: Option<bool>,
    #[serde(default)]
    pub app: Option<AppRef>,
    #[serde(default)]
    pub line_items: Connection<LineItemNode>,
    #[serde(default)]
    pub refunds: Vec<RefundNode>,
}

#[derive(Debug, Deserialize)]
pub struct AppRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemNode {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub discounted_total_set: Option<MoneyBag>,
    #[serde(default)]
    pub tax_lines: Vec<TaxLineNode>,
    #[serde(default)]
    pub variant: Option<VariantNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyBag {
    pub shop_money: Money,
}

#[derive(Debug, Deserialize)]
pub struct Money {
    /// Decimal string, e.g. `"19.90"`.
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLineNode {
    #[serde(default)]
    pub price_set: Option<MoneyBag>,
}

#[derive(Debug, Deserialize)]
pub struct VariantNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub product: Option<ProductRef>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundNode {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_line_items: Connection<RefundLineItemNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineItemNode {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub line_item: Option<RefundedLineNode>,
}

#[derive(Debug, Deserialize)]
pub struct RefundedLineNode {
    #[serde(default)]
    pub variant: Option<VariantNode>,
}
