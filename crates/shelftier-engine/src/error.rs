use chrono::{DateTime, Utc};
use thiserror::Error;

/// Precondition violations. Data-quality problems in individual records are
/// never reported here; they are skipped during aggregation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sales window must end after it starts (from {from}, to {to})")]
    EmptyWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("window length must be at least one day, got {0}")]
    ZeroDays(u32),

    #[error("invalid calendar month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("window bound out of representable range")]
    OutOfRange,

    #[error("page and page size must both be at least 1 (page {page}, page size {page_size})")]
    InvalidPagination { page: usize, page_size: usize },

    #[error("duplicate product id in pre-aggregated input: {0}")]
    DuplicateProduct(String),
}
