//! Maps GraphQL order nodes onto engine order records.

use std::str::FromStr;

use rust_decimal::Decimal;
use shelftier_core::{LineItem, OrderRecord, Refund, RefundLineItem, VariantRef};

use crate::types::{LineItemNode, MoneyBag, OrderNode, RefundLineItemNode, RefundNode, VariantNode};

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn money(bag: Option<&MoneyBag>) -> Option<Decimal> {
    let raw = bag?.shop_money.amount.trim();
    Decimal::from_str(raw).ok()
}

fn quantity(raw: Option<i64>) -> Option<u32> {
    raw.and_then(|q| u32::try_from(q).ok())
}

fn variant(node: VariantNode) -> VariantRef {
    let (product_id, product_name) = node
        .product
        .map(|p| (p.id.trim().to_string(), trimmed(p.title)))
        .unwrap_or_default();
    VariantRef {
        variant_id: trimmed(node.id),
        sku: trimmed(node.sku),
        title: trimmed(node.title),
        product_id,
        product_name,
    }
}

fn line_item(order_id: &str, node: LineItemNode) -> Option<LineItem> {
    let Some(qty) = quantity(node.quantity) else {
        tracing::trace!(order_id, quantity = ?node.quantity, "skipping line with invalid quantity");
        return None;
    };
    let Some(amount) = money(node.discounted_total_set.as_ref()) else {
        tracing::trace!(order_id, "skipping line with unparseable amount");
        return None;
    };
    let tax_lines = node
        .tax_lines
        .iter()
        .filter_map(|t| money(t.price_set.as_ref()))
        .collect();
    Some(LineItem {
        quantity: qty,
        amount,
        tax_lines,
        variant: node.variant.map(variant),
    })
}

fn refund_line(node: RefundLineItemNode) -> Option<RefundLineItem> {
    Some(RefundLineItem {
        quantity: quantity(node.quantity)?,
        variant: node.line_item.and_then(|l| l.variant).map(variant),
    })
}

fn refund(node: RefundNode) -> Refund {
    Refund {
        created_at: node.created_at,
        line_items: node
            .refund_line_items
            .edges
            .into_iter()
            .filter_map(|e| refund_line(e.node))
            .collect(),
    }
}

/// Converts one order node. Lines with a negative quantity or an amount that
/// is not a decimal are dropped.
#[must_use]
pub fn normalize_order(node: OrderNode) -> OrderRecord {
    let id = node.id;
    let line_items = node
        .line_items
        .edges
        .into_iter()
        .filter_map(|e| line_item(&id, e.node))
        .collect();
    OrderRecord {
        created_at: node.created_at,
        processed_at: node.processed_at,
        taxes_included: node.taxes_included.unwrap_or(false),
        app_name: node
            .app
            .and_then(|a| a.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        line_items,
        refunds: node.refunds.into_iter().map(refund).collect(),
        id,
    }
}
