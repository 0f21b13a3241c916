//! Aggregated sales rows and tier labels shared by the engine and adapters.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Rounds a monetary amount to cents, half away from zero.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The sales surface an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    #[default]
    Total,
    Pos,
    Online,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Total => "TOTAL",
            Channel::Pos => "POS",
            Channel::Online => "ONLINE",
        }
    }

    /// Returns `true` when an order attributed to `order_channel` belongs in
    /// a result requested for `self`.
    #[must_use]
    pub fn includes(self, order_channel: Channel) -> bool {
        self == Channel::Total || self == order_channel
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TOTAL" => Ok(Channel::Total),
            "POS" => Ok(Channel::Pos),
            "ONLINE" => Ok(Channel::Online),
            other => Err(CoreError::InvalidChannel(other.to_string())),
        }
    }
}

/// Merchandising tier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "SS")]
    Ss,
    S,
    A,
    B,
    C,
    /// Temporary tier for recently launched products.
    T,
}

impl Tier {
    pub const ALL: [Tier; 6] = [Tier::Ss, Tier::S, Tier::A, Tier::B, Tier::C, Tier::T];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Ss => "SS",
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::T => "T",
        }
    }

    /// Position in the `SS > S > A > B > C` ordering, higher is better.
    /// `T` sits outside the ordering.
    #[must_use]
    pub fn strength(self) -> Option<u8> {
        match self {
            Tier::Ss => Some(5),
            Tier::S => Some(4),
            Tier::A => Some(3),
            Tier::B => Some(2),
            Tier::C => Some(1),
            Tier::T => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SS" => Ok(Tier::Ss),
            "S" => Ok(Tier::S),
            "A" => Ok(Tier::A),
            "B" => Ok(Tier::B),
            "C" => Ok(Tier::C),
            "T" => Ok(Tier::T),
            other => Err(CoreError::InvalidTier(other.to_string())),
        }
    }
}

/// Diagnostic reason attached to a tier assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentReason {
    #[serde(rename = "T<tempWeeks")]
    RecentLaunch,
    #[serde(rename = "SS>=threshold")]
    SsThreshold,
    #[serde(rename = "S>=threshold")]
    SThreshold,
    #[serde(rename = "A>=threshold")]
    AThreshold,
    #[serde(rename = "B fill")]
    Backfill,
    #[serde(rename = "C else")]
    Baseline,
}

impl std::fmt::Display for AssignmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssignmentReason::RecentLaunch => "T<tempWeeks",
            AssignmentReason::SsThreshold => "SS>=threshold",
            AssignmentReason::SThreshold => "S>=threshold",
            AssignmentReason::AThreshold => "A>=threshold",
            AssignmentReason::Backfill => "B fill",
            AssignmentReason::Baseline => "C else",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAssignment {
    pub product_id: String,
    pub tier: Tier,
    pub reason: AssignmentReason,
}

/// One product's sales within a window.
///
/// Quantities can go negative when returns outweigh in-window sales; no
/// clamping happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSalesRow {
    pub product_id: String,
    pub name: String,
    pub qty30: i64,
    pub qty100: i64,
    /// Net revenue (taxes excluded, cents).
    pub revenue: Decimal,
    /// Gross revenue (taxes included, cents).
    pub total_sales: Decimal,
    /// Share of the window total, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_pct: Option<f64>,
    /// Tier label supplied by a pre-aggregated source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tier: Option<Tier>,
    /// Rank supplied by a pre-aggregated source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<DateTime<Utc>>,
}

impl ProductSalesRow {
    #[must_use]
    pub fn new(product_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            qty30: 0,
            qty100: 0,
            revenue: Decimal::ZERO,
            total_sales: Decimal::ZERO,
            share_pct: None,
            source_tier: None,
            source_rank: None,
            launched_at: None,
        }
    }

    #[must_use]
    pub fn total_qty(&self) -> i64 {
        self.qty30 + self.qty100
    }
}
