use serde::Serialize;

use crate::aggregate::{self, ChannelSummary};
use crate::config::BrainConfig;
use crate::ltv::{self, LtvAdjustment};
use crate::models::{safe_ratio, AnalysisWindow, Channel, Cohort, DailyMetric};

/// The attribution stage's snapshot of performance truth: blended and
/// LTV-adjusted ROAS plus per-channel standings.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryOutput {
    pub total_spend: f64,
    pub total_revenue: f64,
    pub blended_roas: f64,
    pub ltv_adjusted_revenue: f64,
    pub ltv_adjusted_roas: f64,
    pub ltv: LtvAdjustment,
    pub channels: Vec<ChannelSummary>,
}

impl MemoryOutput {
    /// The highest-ROAS winner channel, Curiosity's shift_budget target.
    pub fn top_winner(&self) -> Option<&ChannelSummary> {
        self.channels
            .iter()
            .filter(|c| c.status == aggregate::ChannelStatus::Winner)
            .max_by(|a, b| a.roas.total_cmp(&b.roas))
    }
}

/// Composes the metric aggregator and the cohort LTV estimator. Pure
/// beyond rounding for presentation stability: ratios to two decimals,
/// money to whole units.
///
/// Empty metric input yields a zero-valued snapshot with an empty channel
/// list; downstream stages tolerate that shape.
pub fn remember(
    channels: &[Channel],
    metrics: &[DailyMetric],
    cohorts: &[Cohort],
    window: AnalysisWindow,
    config: &BrainConfig,
) -> MemoryOutput {
    let adjustment = ltv::estimate(cohorts, config);

    if metrics.iter().filter(|m| window.contains(m.date)).count() == 0 {
        return MemoryOutput {
            total_spend: 0.0,
            total_revenue: 0.0,
            blended_roas: 0.0,
            ltv_adjusted_revenue: 0.0,
            ltv_adjusted_roas: 0.0,
            ltv: adjustment,
            channels: Vec::new(),
        };
    }

    let rollup = aggregate::rollup(channels, metrics, window, config);
    let adjusted_revenue = rollup.total_revenue * adjustment.factor;
    let adjusted_roas = safe_ratio(adjusted_revenue, rollup.total_spend);

    let channels = rollup
        .channels
        .into_iter()
        .map(|mut summary| {
            summary.spend = round_currency(summary.spend);
            summary.revenue = round_currency(summary.revenue);
            summary.roas = round2(summary.roas);
            summary.revenue_share = round2(summary.revenue_share);
            summary
        })
        .collect();

    MemoryOutput {
        total_spend: round_currency(rollup.total_spend),
        total_revenue: round_currency(rollup.total_revenue),
        blended_roas: round2(rollup.blended_roas),
        ltv_adjusted_revenue: round_currency(adjusted_revenue),
        ltv_adjusted_roas: round2(adjusted_roas),
        ltv: adjustment,
        channels,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round_currency(value: f64) -> f64 {
    value.round()
}
