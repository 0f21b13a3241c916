//! The orders GraphQL document and its search-query filter.

use chrono::{DateTime, SecondsFormat, Utc};
use shelftier_core::TimeField;
use shelftier_engine::SalesWindow;

/// Orders page with line items and refunds. `$after` is `null` for the
/// first page.
pub const ORDERS_QUERY: &str = r"query Orders($first: Int!, $after: String, $query: String) {
  orders(first: $first, after: $after, query: $query, sortKey: PROCESSED_AT) {
    edges {
      cursor
      node {
        id
        createdAt
        processedAt
        taxesIncluded
        app { name }
        lineItems(first: 250) {
          edges {
            node {
              quantity
              discountedTotalSet { shopMoney { amount } }
              taxLines { priceSet { shopMoney { amount } } }
              variant { id sku title product { id title } }
            }
          }
        }
        refunds {
          createdAt
          refundLineItems(first: 250) {
            edges {
              node {
                quantity
                lineItem { variant { id sku title product { id title } } }
              }
            }
          }
        }
      }
    }
    pageInfo { hasNextPage }
  }
}";

/// Orders per page; the Admin API maximum.
pub const PAGE_SIZE: u32 = 100;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builds the `query` search string selecting `[from, to)` on `time_field`,
/// followed by any extra filter terms.
#[must_use]
pub fn search_query(time_field: TimeField, window: &SalesWindow, extra: &str) -> String {
    let field = time_field.as_str();
    let mut q = format!(
        "{field}:>={} {field}:<{}",
        timestamp(window.from),
        timestamp(window.to)
    );
    let extra = extra.trim();
    if !extra.is_empty() {
        q.push(' ');
        q.push_str(extra);
    }
    q
}
