use serde::Serialize;

use crate::config::BrainConfig;
use crate::models::{safe_ratio, Cohort};

/// Outcome of comparing the recent cohort's 90-day LTV against a baseline
/// cohort. When fewer than two eligible cohorts exist the factor stays at
/// 1.0 and `sufficient` is false so callers can tell "no adjustment" apart
/// from "no data".
#[derive(Debug, Clone, Serialize)]
pub struct LtvAdjustment {
    pub factor: f64,
    pub baseline_month: Option<String>,
    pub recent_month: Option<String>,
    pub baseline_ltv_90d: f64,
    pub recent_ltv_90d: f64,
    pub sufficient: bool,
}

impl LtvAdjustment {
    fn insufficient() -> LtvAdjustment {
        LtvAdjustment {
            factor: 1.0,
            baseline_month: None,
            recent_month: None,
            baseline_ltv_90d: 0.0,
            recent_ltv_90d: 0.0,
            sufficient: false,
        }
    }
}

/// Picks the baseline/recent cohort pair and derives the LTV factor.
///
/// The recent cohort is the latest eligible month. The baseline sits the
/// configured number of months back when that much history exists,
/// otherwise the oldest eligible cohort stands in.
pub fn estimate(cohorts: &[Cohort], config: &BrainConfig) -> LtvAdjustment {
    let mut eligible: Vec<&Cohort> = cohorts
        .iter()
        .filter(|c| c.customer_count >= config.ltv_min_customers)
        .collect();
    eligible.sort_by(|a, b| a.month.cmp(&b.month));

    if eligible.len() < 2 {
        return LtvAdjustment::insufficient();
    }

    let recent = eligible[eligible.len() - 1];
    let back = config.ltv_baseline_months_back as usize;
    let baseline_index = eligible.len().saturating_sub(1 + back.max(1));
    let baseline = eligible[baseline_index];

    if baseline.ltv_90d <= 0.0 {
        return LtvAdjustment::insufficient();
    }

    LtvAdjustment {
        factor: safe_ratio(recent.ltv_90d, baseline.ltv_90d),
        baseline_month: Some(baseline.month.clone()),
        recent_month: Some(recent.month.clone()),
        baseline_ltv_90d: baseline.ltv_90d,
        recent_ltv_90d: recent.ltv_90d,
        sufficient: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn cohort(month: &str, customers: i64, ltv_90d: f64) -> Cohort {
        Cohort {
            month: month.to_string(),
            channel: "all".to_string(),
            customer_count: customers,
            total_revenue: ltv_90d * customers as f64,
            avg_order_value: 60.0,
            repeat_rate: 0.3,
            ltv_30d: ltv_90d * 0.6,
            ltv_60d: ltv_90d * 0.8,
            ltv_90d,
            ltv_180d: None,
        }
    }

    #[test]
    fn factor_compares_recent_against_oldest_when_history_is_short() {
        let cohorts = vec![
            cohort("2025-11", 120, 128.0),
            cohort("2025-12", 110, 119.0),
            cohort("2026-01", 115, 115.0),
            cohort("2026-02", 118, 112.0),
        ];
        let adjustment = estimate(&cohorts, &BrainConfig::default());
        assert!(adjustment.sufficient);
        assert_eq!(adjustment.baseline_month.as_deref(), Some("2025-11"));
        assert_eq!(adjustment.recent_month.as_deref(), Some("2026-02"));
        assert!((adjustment.factor - 112.0 / 128.0).abs() < 1e-9);
    }

    #[test]
    fn baseline_sits_configured_months_back_with_long_history() {
        let cohorts: Vec<Cohort> = (1..=9)
            .map(|m| cohort(&format!("2025-{m:02}"), 100, 100.0 + m as f64))
            .collect();
        let adjustment = estimate(&cohorts, &BrainConfig::default());
        // recent is 2025-09, baseline six months back is 2025-03
        assert_eq!(adjustment.baseline_month.as_deref(), Some("2025-03"));
        assert_eq!(adjustment.recent_month.as_deref(), Some("2025-09"));
    }

    #[test]
    fn under_two_eligible_cohorts_signals_insufficiency() {
        let cohorts = vec![cohort("2026-02", 200, 120.0)];
        let adjustment = estimate(&cohorts, &BrainConfig::default());
        assert!(!adjustment.sufficient);
        assert_eq!(adjustment.factor, 1.0);
        assert!(adjustment.baseline_month.is_none());
    }

    #[test]
    fn tiny_cohorts_do_not_count() {
        let cohorts = vec![
            cohort("2026-01", 5, 130.0),
            cohort("2026-02", 8, 90.0),
            cohort("2026-03", 150, 110.0),
        ];
        let adjustment = estimate(&cohorts, &BrainConfig::default());
        assert!(!adjustment.sufficient);
        assert_eq!(adjustment.factor, 1.0);
    }
}
