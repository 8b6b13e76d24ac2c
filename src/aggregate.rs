use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use crate::config::BrainConfig;
use crate::models::{safe_ratio, AnalysisWindow, Channel, DailyMetric, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Winner,
    Loser,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub channel_id: Uuid,
    pub name: String,
    pub platform: Platform,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub revenue_share: f64,
    pub trend: TrendDirection,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone)]
pub struct Rollup {
    pub total_spend: f64,
    pub total_revenue: f64,
    pub blended_roas: f64,
    pub channels: Vec<ChannelSummary>,
}

/// Rolls per-channel daily rows into totals and one summary per channel.
/// Channels keep their input order so downstream tie-breaking is stable.
pub fn rollup(
    channels: &[Channel],
    metrics: &[DailyMetric],
    window: AnalysisWindow,
    config: &BrainConfig,
) -> Rollup {
    let in_window: Vec<&DailyMetric> = metrics
        .iter()
        .filter(|m| window.contains(m.date))
        .collect();

    let total_spend: f64 = in_window.iter().map(|m| m.spend).sum();
    let total_revenue: f64 = in_window.iter().map(|m| m.revenue).sum();
    let blended_roas = safe_ratio(total_revenue, total_spend);

    let mut summaries = Vec::with_capacity(channels.len());
    for channel in channels {
        let rows: Vec<&DailyMetric> = in_window
            .iter()
            .filter(|m| m.channel_id == channel.id)
            .copied()
            .collect();
        let spend: f64 = rows.iter().map(|m| m.spend).sum();
        let revenue: f64 = rows.iter().map(|m| m.revenue).sum();
        let roas = safe_ratio(revenue, spend);

        summaries.push(ChannelSummary {
            channel_id: channel.id,
            name: channel.name.clone(),
            platform: channel.platform,
            spend,
            revenue,
            roas,
            revenue_share: safe_ratio(revenue, total_revenue),
            trend: classify_trend(&rows, window, config.trend_noise),
            status: classify_status(roas, spend, blended_roas, config),
        });
    }

    Rollup {
        total_spend,
        total_revenue,
        blended_roas,
        channels: summaries,
    }
}

fn classify_status(
    roas: f64,
    spend: f64,
    blended_roas: f64,
    config: &BrainConfig,
) -> ChannelStatus {
    // A channel with no spend carries no signal either way.
    if blended_roas <= 0.0 || spend <= 0.0 {
        return ChannelStatus::Neutral;
    }
    if roas >= blended_roas * (1.0 + config.winner_margin) {
        ChannelStatus::Winner
    } else if roas <= blended_roas * (1.0 - config.loser_margin) {
        ChannelStatus::Loser
    } else {
        ChannelStatus::Neutral
    }
}

/// Compares average daily ROAS over the earliest and latest thirds of the
/// window. Deltas inside the noise threshold read as stable.
fn classify_trend(
    rows: &[&DailyMetric],
    window: AnalysisWindow,
    noise: f64,
) -> TrendDirection {
    let third = (window.days / 3).max(1) as i64;
    let early_end = window.start() + Duration::days(third - 1);
    let late_start = window.end - Duration::days(third - 1);

    let early = daily_roas_average(rows, |m| m.date <= early_end);
    let late = daily_roas_average(rows, |m| m.date >= late_start);

    let (early_avg, late_avg) = match (early, late) {
        (Some(e), Some(l)) => (e, l),
        _ => return TrendDirection::Stable,
    };

    if early_avg <= 0.0 {
        return if late_avg > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Stable
        };
    }

    let delta = (late_avg - early_avg) / early_avg;
    if delta > noise {
        TrendDirection::Up
    } else if delta < -noise {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}

fn daily_roas_average<F>(rows: &[&DailyMetric], filter: F) -> Option<f64>
where
    F: Fn(&DailyMetric) -> bool,
{
    let values: Vec<f64> = rows
        .iter()
        .filter(|m| filter(m))
        .map(|m| m.roas())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
