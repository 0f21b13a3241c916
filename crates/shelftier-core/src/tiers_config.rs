//! Tier thresholds and the window parameters that accompany them.
//!
//! [`TiersConfig`] is the validated form the engine consumes. Untrusted input
//! (request bodies, the persisted JSON file) arrives as [`TiersConfigInput`]
//! and is normalized field by field against a last-known-good config.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigError;

/// Longest trailing window accepted for `salesWindowDays`, about ten years.
pub const MAX_SALES_WINDOW_DAYS: u32 = 3660;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(rename = "tierSSPct")]
    pub tier_ss_pct: f64,
    #[serde(rename = "tierSPct")]
    pub tier_s_pct: f64,
    #[serde(rename = "tierAPct")]
    pub tier_a_pct: f64,
    /// Minimum count of non-`C` threshold tiers the backfill aims for.
    #[serde(rename = "tiersTopCount")]
    pub tiers_top_count: u32,
    /// Products launched less than this many weeks ago get tier `T`.
    #[serde(rename = "tempTierWeeks")]
    pub temp_tier_weeks: u32,
    #[serde(rename = "salesWindowDays")]
    pub sales_window_days: u32,
    /// Client display preference. Server default windows always end at the
    /// last completed local day.
    #[serde(rename = "useCompletedDays")]
    pub use_completed_days: bool,
    #[serde(rename = "recalcFrequencyDays")]
    pub recalc_frequency_days: u32,
    #[serde(rename = "graceMonthsC")]
    pub grace_months_c: u32,
    #[serde(rename = "configVersion")]
    pub config_version: u64,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            tier_ss_pct: 20.0,
            tier_s_pct: 5.0,
            tier_a_pct: 1.5,
            tiers_top_count: 30,
            temp_tier_weeks: 12,
            sales_window_days: 35,
            use_completed_days: false,
            recalc_frequency_days: 14,
            grace_months_c: 12,
            config_version: 1,
        }
    }
}

/// Loosely-typed config as received from a client or read from disk.
///
/// Every field is optional and kept as raw JSON so that one malformed value
/// does not reject the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiersConfigInput {
    #[serde(rename = "tierSSPct", default)]
    pub tier_ss_pct: Option<Value>,
    #[serde(rename = "tierSPct", default)]
    pub tier_s_pct: Option<Value>,
    #[serde(rename = "tierAPct", default)]
    pub tier_a_pct: Option<Value>,
    #[serde(rename = "tiersTopCount", default)]
    pub tiers_top_count: Option<Value>,
    #[serde(rename = "tempTierWeeks", default)]
    pub temp_tier_weeks: Option<Value>,
    #[serde(rename = "salesWindowDays", default)]
    pub sales_window_days: Option<Value>,
    #[serde(rename = "useCompletedDays", default)]
    pub use_completed_days: Option<Value>,
    #[serde(rename = "recalcFrequencyDays", default)]
    pub recalc_frequency_days: Option<Value>,
    #[serde(rename = "graceMonthsC", default)]
    pub grace_months_c: Option<Value>,
    #[serde(rename = "configVersion", default)]
    pub config_version: Option<Value>,
}

impl From<&TiersConfig> for TiersConfigInput {
    fn from(cfg: &TiersConfig) -> Self {
        Self {
            tier_ss_pct: Some(Value::from(cfg.tier_ss_pct)),
            tier_s_pct: Some(Value::from(cfg.tier_s_pct)),
            tier_a_pct: Some(Value::from(cfg.tier_a_pct)),
            tiers_top_count: Some(Value::from(cfg.tiers_top_count)),
            temp_tier_weeks: Some(Value::from(cfg.temp_tier_weeks)),
            sales_window_days: Some(Value::from(cfg.sales_window_days)),
            use_completed_days: Some(Value::from(cfg.use_completed_days)),
            recalc_frequency_days: Some(Value::from(cfg.recalc_frequency_days)),
            grace_months_c: Some(Value::from(cfg.grace_months_c)),
            config_version: Some(Value::from(cfg.config_version)),
        }
    }
}

impl TiersConfig {
    /// Builds a config from untrusted input.
    ///
    /// Each field is taken from `input` when it is a finite, non-negative
    /// number, and from `fallback` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ThresholdOrder`] when the resulting thresholds
    /// do not satisfy `SS >= S >= A`.
    pub fn normalized(input: &TiersConfigInput, fallback: &TiersConfig) -> Result<Self, ConfigError> {
        let cfg = Self {
            tier_ss_pct: percent(input.tier_ss_pct.as_ref()).unwrap_or(fallback.tier_ss_pct),
            tier_s_pct: percent(input.tier_s_pct.as_ref()).unwrap_or(fallback.tier_s_pct),
            tier_a_pct: percent(input.tier_a_pct.as_ref()).unwrap_or(fallback.tier_a_pct),
            tiers_top_count: count(input.tiers_top_count.as_ref())
                .unwrap_or(fallback.tiers_top_count),
            temp_tier_weeks: count(input.temp_tier_weeks.as_ref())
                .unwrap_or(fallback.temp_tier_weeks),
            sales_window_days: count(input.sales_window_days.as_ref())
                .filter(|d| (1..=MAX_SALES_WINDOW_DAYS).contains(d))
                .unwrap_or(fallback.sales_window_days),
            use_completed_days: input
                .use_completed_days
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(fallback.use_completed_days),
            recalc_frequency_days: count(input.recalc_frequency_days.as_ref())
                .unwrap_or(fallback.recalc_frequency_days),
            grace_months_c: count(input.grace_months_c.as_ref())
                .unwrap_or(fallback.grace_months_c),
            config_version: non_negative(input.config_version.as_ref())
                .and_then(|v| truncate_u64(v).filter(|v| *v > 0))
                .unwrap_or(fallback.config_version),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the precondition the tier engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ThresholdOrder`] when `SS >= S >= A` does not
    /// hold or a threshold is not a finite non-negative number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.tier_ss_pct, self.tier_s_pct, self.tier_a_pct]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !finite || self.tier_ss_pct < self.tier_s_pct || self.tier_s_pct < self.tier_a_pct {
            return Err(ConfigError::ThresholdOrder {
                ss: self.tier_ss_pct,
                s: self.tier_s_pct,
                a: self.tier_a_pct,
            });
        }
        Ok(())
    }
}

fn non_negative(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn percent(value: Option<&Value>) -> Option<f64> {
    non_negative(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: Option<&Value>) -> Option<u32> {
    non_negative(value)
        .filter(|v| *v <= f64::from(u32::MAX))
        .map(|v| v.round() as u32)
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn truncate_u64(value: f64) -> Option<u64> {
    if value > u64::MAX as f64 {
        return None;
    }
    Some(value.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> TiersConfigInput {
        serde_json::from_value(value).expect("valid input json")
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TiersConfig::default();
        assert!((cfg.tier_ss_pct - 20.0).abs() < f64::EPSILON);
        assert!((cfg.tier_s_pct - 5.0).abs() < f64::EPSILON);
        assert!((cfg.tier_a_pct - 1.5).abs() < f64::EPSILON);
        assert_eq!(cfg.tiers_top_count, 30);
        assert_eq!(cfg.temp_tier_weeks, 12);
        assert_eq!(cfg.sales_window_days, 35);
        assert_eq!(cfg.config_version, 1);
    }

    #[test]
    fn normalized_takes_valid_fields_from_input() {
        let cfg = TiersConfig::normalized(
            &input(json!({ "tierSSPct": 25, "tiersTopCount": 10, "useCompletedDays": true })),
            &TiersConfig::default(),
        )
        .unwrap();
        assert!((cfg.tier_ss_pct - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.tiers_top_count, 10);
        assert!(cfg.use_completed_days);
        assert_eq!(cfg.temp_tier_weeks, 12);
    }

    #[test]
    fn normalized_falls_back_on_malformed_fields() {
        let fallback = TiersConfig {
            tiers_top_count: 7,
            ..TiersConfig::default()
        };
        let cfg = TiersConfig::normalized(
            &input(json!({ "tiersTopCount": "lots", "tierAPct": -1, "tempTierWeeks": null })),
            &fallback,
        )
        .unwrap();
        assert_eq!(cfg.tiers_top_count, 7);
        assert!((cfg.tier_a_pct - 1.5).abs() < f64::EPSILON);
        assert_eq!(cfg.temp_tier_weeks, 12);
    }

    #[test]
    fn normalized_rejects_out_of_order_thresholds() {
        let err = TiersConfig::normalized(
            &input(json!({ "tierSSPct": 2, "tierSPct": 5 })),
            &TiersConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder { .. }));
    }

    #[test]
    fn zero_window_days_keeps_fallback() {
        let cfg = TiersConfig::normalized(
            &input(json!({ "salesWindowDays": 0 })),
            &TiersConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.sales_window_days, 35);
    }

    #[test]
    fn oversized_window_days_keep_fallback() {
        let fallback = TiersConfig {
            sales_window_days: 28,
            ..TiersConfig::default()
        };
        for days in [json!(u32::MAX), json!(MAX_SALES_WINDOW_DAYS + 1)] {
            let cfg =
                TiersConfig::normalized(&input(json!({ "salesWindowDays": days })), &fallback)
                    .unwrap();
            assert_eq!(cfg.sales_window_days, 28);
        }
        let cfg = TiersConfig::normalized(
            &input(json!({ "salesWindowDays": MAX_SALES_WINDOW_DAYS })),
            &fallback,
        )
        .unwrap();
        assert_eq!(cfg.sales_window_days, MAX_SALES_WINDOW_DAYS);
    }

    #[test]
    fn serializes_with_camel_case_threshold_names() {
        let json = serde_json::to_value(TiersConfig::default()).unwrap();
        assert_eq!(json["tierSSPct"], 20.0);
        assert_eq!(json["tiersTopCount"], 30);
        assert_eq!(json["graceMonthsC"], 12);
    }

    #[test]
    fn input_round_trips_through_config() {
        let cfg = TiersConfig {
            tier_a_pct: 2.0,
            config_version: 9,
            ..TiersConfig::default()
        };
        let rebuilt =
            TiersConfig::normalized(&TiersConfigInput::from(&cfg), &TiersConfig::default())
                .unwrap();
        assert_eq!(rebuilt, cfg);
    }
}
