use serde::Serialize;

use crate::config::BrainConfig;
use crate::ltv;
use crate::models::{Cohort, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LtvTrend {
    Improving,
    Declining,
    Stable,
}

/// Organization-wide shift in cohort lifetime value. At most one finding
/// per cycle; drift is a single fact, not a per-channel one.
#[derive(Debug, Clone, Serialize)]
pub struct DriftFinding {
    pub baseline_month: String,
    pub recent_month: String,
    pub baseline_ltv_90d: f64,
    pub recent_ltv_90d: f64,
    pub drift_pct: f64,
    pub severity: Severity,
    pub trend: LtvTrend,
    pub recommended_action: String,
}

/// Reuses the LTV estimator's baseline/recent cohort pair. Negative drift
/// is erosion; the severity bands sit on the absolute value.
pub fn detect(cohorts: &[Cohort], config: &BrainConfig) -> Option<DriftFinding> {
    let adjustment = ltv::estimate(cohorts, config);
    if !adjustment.sufficient {
        return None;
    }

    let drift_pct = (adjustment.recent_ltv_90d - adjustment.baseline_ltv_90d)
        / adjustment.baseline_ltv_90d
        * 100.0;
    if drift_pct.abs() <= config.drift_threshold {
        return None;
    }

    let magnitude = drift_pct.abs();
    let severity = if magnitude >= config.decay_high_threshold {
        Severity::High
    } else if magnitude >= config.decay_medium_threshold {
        Severity::Medium
    } else {
        Severity::Low
    };

    let trend = if drift_pct > config.drift_dead_zone {
        LtvTrend::Improving
    } else if drift_pct < -config.drift_dead_zone {
        LtvTrend::Declining
    } else {
        LtvTrend::Stable
    };

    Some(DriftFinding {
        baseline_month: adjustment.baseline_month.unwrap_or_default(),
        recent_month: adjustment.recent_month.unwrap_or_default(),
        baseline_ltv_90d: adjustment.baseline_ltv_90d,
        recent_ltv_90d: adjustment.recent_ltv_90d,
        drift_pct,
        severity,
        trend,
        recommended_action: action_for(trend, severity).to_string(),
    })
}

fn action_for(trend: LtvTrend, severity: Severity) -> &'static str {
    match (trend, severity) {
        (LtvTrend::Improving, _) => "Customer quality is rising; lean into acquisition",
        (_, Severity::High) => "Audit acquisition mix; recent customers are worth far less",
        (_, Severity::Medium) => "Tighten targeting toward historically high-LTV segments",
        (_, Severity::Low) => "Monitor cohort quality over the next month",
    }
}
