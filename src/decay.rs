use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::config::BrainConfig;
use crate::models::{safe_ratio, AnalysisWindow, Channel, DailyMetric, Severity};

/// One channel whose ROAS has slid against its own recent history.
/// Improvements never produce a finding.
#[derive(Debug, Clone, Serialize)]
pub struct DecayFinding {
    pub channel_id: Uuid,
    pub channel_name: String,
    pub baseline_roas: f64,
    pub recent_roas: f64,
    pub decay_pct: f64,
    pub severity: Severity,
    pub recent_spend: f64,
    pub recommended_action: String,
}

pub fn detect(
    channels: &[Channel],
    metrics: &[DailyMetric],
    window: AnalysisWindow,
    config: &BrainConfig,
) -> Vec<DecayFinding> {
    let mut findings = Vec::new();
    let (base_start, base_end) = window.baseline_range();

    for channel in channels {
        let rows: Vec<&DailyMetric> = metrics
            .iter()
            .filter(|m| m.channel_id == channel.id)
            .collect();

        let (baseline_roas, baseline_spend) = span_roas(&rows, base_start, base_end);
        let (recent_roas, recent_spend) = span_roas(&rows, window.recent_start(), window.end);

        // Nothing to compare against without spend in both spans.
        if baseline_spend <= 0.0 || recent_spend <= 0.0 || baseline_roas <= 0.0 {
            continue;
        }

        let decay_pct = ((baseline_roas - recent_roas) / baseline_roas * 100.0).max(0.0);
        if decay_pct < config.decay_low_threshold {
            continue;
        }

        let severity = if decay_pct >= config.decay_high_threshold {
            Severity::High
        } else if decay_pct >= config.decay_medium_threshold {
            Severity::Medium
        } else {
            Severity::Low
        };

        findings.push(DecayFinding {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            baseline_roas,
            recent_roas,
            decay_pct,
            severity,
            recent_spend,
            recommended_action: action_for(severity).to_string(),
        });
    }

    findings
}

fn span_roas(rows: &[&DailyMetric], start: NaiveDate, end: NaiveDate) -> (f64, f64) {
    let in_span: Vec<&&DailyMetric> = rows
        .iter()
        .filter(|m| m.date >= start && m.date <= end)
        .collect();
    let spend: f64 = in_span.iter().map(|m| m.spend).sum();
    let revenue: f64 = in_span.iter().map(|m| m.revenue).sum();
    (safe_ratio(revenue, spend), spend)
}

fn action_for(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "Pause or cut spend hard while the drop is diagnosed",
        Severity::Medium => "Reduce spend and shift budget to stronger channels",
        Severity::Low => "Review targeting and creative mix on this channel",
    }
}
