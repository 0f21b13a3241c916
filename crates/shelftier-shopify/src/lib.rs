//! Shopify Admin GraphQL adapter: fetches orders for a window and hands them
//! to the engine as [`shelftier_core::OrderRecord`]s.

pub mod client;
pub mod error;
pub mod normalize;
pub mod query;
mod retry;
pub mod types;

pub use client::ShopifyOrdersClient;
pub use error::ShopifyError;
pub use normalize::normalize_order;
pub use query::{search_query, ORDERS_QUERY};
