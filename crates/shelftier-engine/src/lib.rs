//! Sales aggregation and tier assignment.
//!
//! Everything here is synchronous and operates on already-fetched records;
//! fetching, caching and transport live in the adapter crates.

pub mod aggregate;
pub mod error;
pub mod size;
pub mod sku;
pub mod summary;
pub mod tiering;
pub mod window;

pub use aggregate::Aggregator;
pub use error::EngineError;
pub use size::{SizeBucket, SizeClassifier, SizeMatch, TextMatcher};
pub use sku::{summarize_sku, SkuSummary, SkuTotals};
pub use summary::{
    attach_revenue_shares, Orchestrator, RankedRow, SalesInput, SlimRow, Summary, SummaryQuery,
    SummaryRow,
};
pub use tiering::{assign_tiers, fill_quantity_shares, threshold_tier};
pub use window::{
    calendar_month, days_ending_on, previous_window, trailing_days, SalesWindow,
};
