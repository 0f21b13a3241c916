//! Threshold tiering with a recent-launch override and a B backfill.

use chrono::{DateTime, Duration, Utc};
use shelftier_core::{AssignmentReason, ProductSalesRow, Tier, TierAssignment, TiersConfig};

/// Fills in `share_pct` for rows that lack one, as a share of total
/// quantity. Rows that already carry a share keep it.
pub fn fill_quantity_shares(rows: &mut [ProductSalesRow]) {
    #[allow(clippy::cast_precision_loss)]
    let denominator = rows.iter().map(ProductSalesRow::total_qty).sum::<i64>().max(1) as f64;
    for row in rows.iter_mut().filter(|r| r.share_pct.is_none()) {
        #[allow(clippy::cast_precision_loss)]
        let qty = row.total_qty() as f64;
        row.share_pct = Some(qty * 100.0 / denominator);
    }
}

/// Assigns exactly one tier to every row.
///
/// `config` is assumed valid (`SS >= S >= A`). Output is ordered by
/// descending share; rows with equal shares keep their input order.
#[must_use]
pub fn assign_tiers(
    rows: &[ProductSalesRow],
    config: &TiersConfig,
    now: DateTime<Utc>,
) -> Vec<TierAssignment> {
    let mut shared = rows.to_vec();
    fill_quantity_shares(&mut shared);
    // `sort_by` is stable, so ties keep input order.
    shared.sort_by(|a, b| share(b).total_cmp(&share(a)));

    let recent = Duration::weeks(i64::from(config.temp_tier_weeks));
    let mut assignments: Vec<TierAssignment> = shared
        .iter()
        .map(|row| {
            let (tier, reason) = match row.launched_at {
                Some(launched) if now.signed_duration_since(launched) < recent => {
                    (Tier::T, AssignmentReason::RecentLaunch)
                }
                _ => threshold_tier(share(row), config),
            };
            TierAssignment {
                product_id: row.product_id.clone(),
                tier,
                reason,
            }
        })
        .collect();

    backfill(&mut assignments, config.tiers_top_count);
    assignments
}

/// Tier from share alone, before any backfill.
#[must_use]
pub fn threshold_tier(share_pct: f64, config: &TiersConfig) -> (Tier, AssignmentReason) {
    if share_pct >= config.tier_ss_pct {
        (Tier::Ss, AssignmentReason::SsThreshold)
    } else if share_pct >= config.tier_s_pct {
        (Tier::S, AssignmentReason::SThreshold)
    } else if share_pct >= config.tier_a_pct {
        (Tier::A, AssignmentReason::AThreshold)
    } else {
        (Tier::C, AssignmentReason::Baseline)
    }
}

/// Promotes the highest-share `C` rows to `B` until the threshold tiers plus
/// `B` reach `top_count`. Expects `assignments` sorted by descending share.
fn backfill(assignments: &mut [TierAssignment], top_count: u32) {
    let current_top = assignments
        .iter()
        .filter(|a| matches!(a.tier, Tier::Ss | Tier::S | Tier::A))
        .count();
    let wanted = usize::try_from(top_count).unwrap_or(usize::MAX);
    let missing = wanted.saturating_sub(current_top);
    if missing == 0 {
        return;
    }
    for assignment in assignments
        .iter_mut()
        .filter(|a| a.tier == Tier::C)
        .take(missing)
    {
        assignment.tier = Tier::B;
        assignment.reason = AssignmentReason::Backfill;
    }
}

fn share(row: &ProductSalesRow) -> f64 {
    row.share_pct.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn row(id: &str, share: f64) -> ProductSalesRow {
        let mut r = ProductSalesRow::new(id, id);
        r.share_pct = Some(share);
        r
    }

    fn config(top: u32) -> TiersConfig {
        TiersConfig {
            tiers_top_count: top,
            ..TiersConfig::default()
        }
    }

    fn tiers(assignments: &[TierAssignment]) -> Vec<Tier> {
        assignments.iter().map(|a| a.tier).collect()
    }

    #[test]
    fn thresholds_then_backfill() {
        let rows: Vec<_> = [25.0, 10.0, 3.0, 1.0, 0.5]
            .iter()
            .enumerate()
            .map(|(i, s)| row(&format!("p{i}"), *s))
            .collect();
        let cfg = TiersConfig {
            tier_a_pct: 5.0,
            ..config(3)
        };
        // With A raised to S, the 3% product misses every threshold.
        let before: Vec<Tier> = rows.iter().map(|r| threshold_tier(share(r), &cfg).0).collect();
        assert_eq!(before, vec![Tier::Ss, Tier::S, Tier::C, Tier::C, Tier::C]);

        let after = assign_tiers(&rows, &cfg, now());
        assert_eq!(tiers(&after), vec![Tier::Ss, Tier::S, Tier::B, Tier::C, Tier::C]);
        assert_eq!(after[2].product_id, "p2");
        assert_eq!(after[2].reason, AssignmentReason::Backfill);
    }

    #[test]
    fn default_thresholds_place_a_tier() {
        let rows = vec![row("a", 25.0), row("b", 10.0), row("c", 3.0), row("d", 1.0), row("e", 0.5)];
        let after = assign_tiers(&rows, &config(3), now());
        assert_eq!(tiers(&after), vec![Tier::Ss, Tier::S, Tier::A, Tier::C, Tier::C]);
    }

    #[test]
    fn backfill_never_exceeds_available_c_rows() {
        let rows = vec![row("a", 60.0), row("b", 40.0)];
        let after = assign_tiers(&rows, &config(30), now());
        assert_eq!(tiers(&after), vec![Tier::Ss, Tier::Ss]);
    }

    #[test]
    fn recent_launch_overrides_thresholds_and_backfill() {
        let mut fresh = row("new", 50.0);
        fresh.launched_at = Some(now() - Duration::weeks(3));
        let mut old = row("old", 0.1);
        old.launched_at = Some(now() - Duration::weeks(52));
        let mut tiny_fresh = row("tiny", 0.0);
        tiny_fresh.launched_at = Some(now() - Duration::days(1));

        let after = assign_tiers(&[old, fresh, tiny_fresh], &config(5), now());
        let by_id = |id: &str| after.iter().find(|a| a.product_id == id).unwrap().tier;
        assert_eq!(by_id("new"), Tier::T);
        assert_eq!(by_id("tiny"), Tier::T);
        assert_eq!(by_id("old"), Tier::B);
    }

    #[test]
    fn launch_exactly_at_boundary_is_not_recent() {
        let mut r = row("p", 0.1);
        r.launched_at = Some(now() - Duration::weeks(12));
        let after = assign_tiers(&[r], &config(0), now());
        assert_eq!(after[0].tier, Tier::C);
    }

    #[test]
    fn missing_shares_fall_back_to_quantity() {
        let mut a = ProductSalesRow::new("a", "a");
        a.qty30 = 3;
        a.qty100 = 1;
        let mut b = ProductSalesRow::new("b", "b");
        b.qty30 = 16;
        let mut rows = vec![a, b];
        fill_quantity_shares(&mut rows);
        assert!((rows[0].share_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((rows[1].share_pct.unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn zero_quantities_yield_zero_shares() {
        let mut rows = vec![ProductSalesRow::new("a", "a"), ProductSalesRow::new("b", "b")];
        fill_quantity_shares(&mut rows);
        assert!(rows.iter().all(|r| r.share_pct == Some(0.0)));
        let after = assign_tiers(&rows, &config(1), now());
        assert_eq!(tiers(&after), vec![Tier::B, Tier::C]);
        assert_eq!(after[0].product_id, "a");
    }

    #[test]
    fn ties_keep_input_order() {
        let rows = vec![row("x", 2.0), row("y", 2.0), row("z", 2.0)];
        let after = assign_tiers(&rows, &config(0), now());
        let ids: Vec<_> = after.iter().map(|a| a.product_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn threshold_tiers_are_monotonic_in_share() {
        let cfg = TiersConfig::default();
        let shares: Vec<f64> = (0..=300).map(|i| f64::from(i) / 10.0).collect();
        for pair in shares.windows(2) {
            let low = threshold_tier(pair[0], &cfg).0.strength();
            let high = threshold_tier(pair[1], &cfg).0.strength();
            assert!(high >= low, "tier dropped between {} and {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn every_row_receives_one_assignment() {
        let rows: Vec<_> = (0..40)
            .map(|i| row(&format!("p{i}"), f64::from(i) * 0.25))
            .collect();
        let cfg = config(10);
        let after = assign_tiers(&rows, &cfg, now());
        assert_eq!(after.len(), rows.len());

        let count = |t: Tier| after.iter().filter(|a| a.tier == t).count();
        let top = count(Tier::Ss) + count(Tier::S) + count(Tier::A);
        assert!(top + count(Tier::B) >= 10.min(after.len()));
    }
}
