//! Accounting and comparison policies consumed by the engine.
//!
//! Defaults are resolved by the caller (env config, request parameters);
//! nothing in the engine falls back to process-wide state.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Which order timestamp the upstream fetch used to select the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    CreatedAt,
    #[default]
    ProcessedAt,
}

impl TimeField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TimeField::CreatedAt => "created_at",
            TimeField::ProcessedAt => "processed_at",
        }
    }
}

impl std::fmt::Display for TimeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" => Ok(TimeField::CreatedAt),
            "processed_at" => Ok(TimeField::ProcessedAt),
            other => Err(CoreError::InvalidTimeField(other.to_string())),
        }
    }
}

/// How the comparison window preceding the requested one is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaBase {
    /// Ends exactly where the requested window starts, same duration.
    #[default]
    AnchorStart,
    /// Both bounds shifted back by the window length in whole days.
    AnchorEnd,
    /// The calendar month before the one containing the window start.
    PreviousMonth,
}

impl DeltaBase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeltaBase::AnchorStart => "anchor_start",
            DeltaBase::AnchorEnd => "anchor_end",
            DeltaBase::PreviousMonth => "month_prev",
        }
    }
}

impl std::fmt::Display for DeltaBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeltaBase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anchor_start" => Ok(DeltaBase::AnchorStart),
            "anchor_end" => Ok(DeltaBase::AnchorEnd),
            "month_prev" | "previous_month" => Ok(DeltaBase::PreviousMonth),
            other => Err(CoreError::InvalidDeltaBase(other.to_string())),
        }
    }
}

/// Accounting choices applied while aggregating order records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingPolicy {
    /// Subtract refunded units and their reconstructed revenue.
    pub net_of_returns: bool,
    /// Count a refund only when its own timestamp lies in the window.
    pub by_refund_date: bool,
    /// Informational; window filtering happens upstream.
    pub time_field: TimeField,
    /// Opaque search clause appended by the fetch adapter.
    #[serde(default)]
    pub extra_query: String,
    /// Literal prefix a SKU must start with. Empty disables the filter.
    #[serde(default)]
    pub sku_prefix: String,
}

impl AccountingPolicy {
    /// Returns `true` when `sku` passes the prefix filter.
    #[must_use]
    pub fn sku_allowed(&self, sku: &str) -> bool {
        self.sku_prefix.is_empty() || sku.starts_with(&self.sku_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_field_parses_case_insensitively() {
        assert_eq!(
            "Created_At".parse::<TimeField>().unwrap(),
            TimeField::CreatedAt
        );
        assert_eq!(
            "processed_at".parse::<TimeField>().unwrap(),
            TimeField::ProcessedAt
        );
        assert!("updated_at".parse::<TimeField>().is_err());
    }

    #[test]
    fn delta_base_accepts_month_aliases() {
        assert_eq!(
            "month_prev".parse::<DeltaBase>().unwrap(),
            DeltaBase::PreviousMonth
        );
        assert_eq!(
            "previous_month".parse::<DeltaBase>().unwrap(),
            DeltaBase::PreviousMonth
        );
        assert_eq!(DeltaBase::default(), DeltaBase::AnchorStart);
    }

    #[test]
    fn empty_sku_prefix_allows_everything() {
        let policy = AccountingPolicy::default();
        assert!(policy.sku_allowed(""));
        assert!(policy.sku_allowed("XYZ-100"));
    }

    #[test]
    fn sku_prefix_is_a_literal_match() {
        let policy = AccountingPolicy {
            sku_prefix: "PF.".to_string(),
            ..AccountingPolicy::default()
        };
        assert!(policy.sku_allowed("PF.ROSE-30"));
        assert!(!policy.sku_allowed("PFXROSE-30"));
        assert!(!policy.sku_allowed("pf.rose-30"));
    }
}
