use serde::Serialize;
use uuid::Uuid;

use crate::config::BrainConfig;
use crate::models::{
    safe_ratio, AnalysisWindow, Creative, CreativeDailyMetric, CreativeStatus, Severity,
};

/// One creative showing audience fatigue: conversion rate falling, cost per
/// acquisition rising, or frequency past saturation.
#[derive(Debug, Clone, Serialize)]
pub struct FatigueFinding {
    pub creative_id: Uuid,
    pub creative_name: String,
    pub channel_id: Uuid,
    pub probability: f64,
    pub severity: Severity,
    pub baseline_cvr: f64,
    pub recent_cvr: f64,
    pub baseline_cpa: f64,
    pub recent_cpa: f64,
    pub baseline_frequency: f64,
    pub recent_frequency: f64,
    pub recent_spend: f64,
    pub recommended_action: String,
}

/// Window averages weighted by the underlying counts, not by day.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowRates {
    pub cvr: f64,
    pub cpa: f64,
    pub frequency: f64,
    pub spend: f64,
    pub days: usize,
}

pub fn detect(
    creatives: &[Creative],
    metrics: &[CreativeDailyMetric],
    window: AnalysisWindow,
    config: &BrainConfig,
) -> Vec<FatigueFinding> {
    let mut findings = Vec::new();

    for creative in creatives {
        if creative.status != CreativeStatus::Active {
            continue;
        }
        let rows: Vec<&CreativeDailyMetric> = metrics
            .iter()
            .filter(|m| m.creative_id == creative.id)
            .collect();

        let (base_start, base_end) = window.baseline_range();
        let baseline = window_rates(&rows, base_start, base_end);
        let recent = window_rates(&rows, window.recent_start(), window.end);

        // Young creatives with thin history are skipped, not flagged.
        if baseline.days < config.fatigue_min_days || recent.days < config.fatigue_min_days {
            continue;
        }

        let probability = probability(&baseline, &recent, config);
        if probability <= config.fatigue_watch_threshold {
            continue;
        }

        let severity = severity_for(probability, config);
        findings.push(FatigueFinding {
            creative_id: creative.id,
            creative_name: creative.name.clone(),
            channel_id: creative.channel_id,
            probability,
            severity,
            baseline_cvr: baseline.cvr,
            recent_cvr: recent.cvr,
            baseline_cpa: baseline.cpa,
            recent_cpa: recent.cpa,
            baseline_frequency: baseline.frequency,
            recent_frequency: recent.frequency,
            recent_spend: recent.spend,
            recommended_action: action_for(severity).to_string(),
        });
    }

    findings
}

fn window_rates(
    rows: &[&CreativeDailyMetric],
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> WindowRates {
    let in_window: Vec<&&CreativeDailyMetric> = rows
        .iter()
        .filter(|m| m.date >= start && m.date <= end)
        .collect();

    let spend: f64 = in_window.iter().map(|m| m.spend).sum();
    let clicks: i64 = in_window.iter().map(|m| m.clicks).sum();
    let conversions: i64 = in_window.iter().map(|m| m.conversions).sum();
    let impressions: i64 = in_window.iter().map(|m| m.impressions).sum();
    let weighted_frequency: f64 = in_window
        .iter()
        .map(|m| m.frequency * m.impressions as f64)
        .sum();

    WindowRates {
        cvr: safe_ratio(conversions as f64, clicks as f64),
        cpa: safe_ratio(spend, conversions as f64),
        frequency: safe_ratio(weighted_frequency, impressions as f64),
        spend,
        days: in_window.len(),
    }
}

/// Weighted combination of three normalized signals: CVR decline (0.5),
/// CPA rise (0.3), frequency past saturation (0.2). A relative change of
/// `fatigue_signal_scale` saturates the CVR/CPA signals; each signal is
/// clamped to [0,1] before weighting.
pub fn probability(baseline: &WindowRates, recent: &WindowRates, config: &BrainConfig) -> f64 {
    let scale = config.fatigue_signal_scale.max(f64::EPSILON);

    let cvr_decline = if baseline.cvr > 0.0 {
        ((baseline.cvr - recent.cvr) / baseline.cvr / scale).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cpa_rise = if baseline.cpa > 0.0 {
        ((recent.cpa - baseline.cpa) / baseline.cpa / scale).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let saturation = config.frequency_saturation.max(f64::EPSILON);
    let frequency_over = ((recent.frequency / saturation - 1.0) / scale).clamp(0.0, 1.0);

    (0.5 * cvr_decline + 0.3 * cpa_rise + 0.2 * frequency_over).clamp(0.0, 1.0)
}

fn severity_for(probability: f64, config: &BrainConfig) -> Severity {
    if probability >= config.fatigue_high_threshold {
        Severity::High
    } else if probability >= config.fatigue_medium_threshold {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn action_for(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "Pause immediately and rotate in fresh creative",
        Severity::Medium => "Queue a replacement and tighten frequency caps",
        Severity::Low => "Watch closely and schedule a creative refresh",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn window() -> AnalysisWindow {
        AnalysisWindow::trailing(NaiveDate::from_ymd_opt(2026, 3, 30).unwrap(), 30)
    }

    fn creative(name: &str, status: CreativeStatus) -> Creative {
        Creative {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            name: name.to_string(),
            status,
            launched_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
    }

    /// 28 days of history: healthy baseline fortnight, then the recent
    /// fortnight per the supplied daily conversions and frequency.
    fn history(
        creative_id: Uuid,
        w: AnalysisWindow,
        recent_conversions: i64,
        recent_frequency: f64,
    ) -> Vec<CreativeDailyMetric> {
        let (base_start, _) = w.baseline_range();
        (0..28)
            .map(|offset| {
                let date = base_start + Duration::days(offset);
                let recent = date >= w.recent_start();
                CreativeDailyMetric {
                    creative_id,
                    date,
                    spend: 400.0,
                    revenue: 900.0,
                    impressions: 20_000,
                    clicks: 1000,
                    conversions: if recent { recent_conversions } else { 80 },
                    frequency: if recent { recent_frequency } else { 2.5 },
                }
            })
            .collect()
    }

    #[test]
    fn collapsing_cvr_with_rising_frequency_flags_high() {
        let unit = creative("UGC Hook v3", CreativeStatus::Active);
        // CVR 0.08 -> 0.05, frequency 2.5 -> 4.0
        let metrics = history(unit.id, window(), 50, 4.0);
        let findings = detect(&[unit], &metrics, window(), &BrainConfig::default());
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert!(finding.probability > 0.65);
        assert!((finding.baseline_cvr - 0.08).abs() < 1e-9);
        assert!((finding.recent_cvr - 0.05).abs() < 1e-9);
        assert!(finding.recommended_action.contains("Pause immediately"));
    }

    #[test]
    fn probability_rises_as_recent_cvr_falls() {
        let config = BrainConfig::default();
        let baseline = WindowRates {
            cvr: 0.08,
            cpa: 5.0,
            frequency: 2.5,
            spend: 5600.0,
            days: 14,
        };
        let mut last = -1.0;
        for recent_cvr in [0.08, 0.07, 0.06, 0.05, 0.04, 0.02] {
            let recent = WindowRates {
                cvr: recent_cvr,
                ..baseline
            };
            let p = probability(&baseline, &recent, &config);
            assert!(p >= last, "probability fell as CVR declined");
            last = p;
        }
    }

    #[test]
    fn healthy_creative_emits_nothing() {
        let unit = creative("Evergreen Static", CreativeStatus::Active);
        let metrics = history(unit.id, window(), 80, 2.5);
        let findings = detect(&[unit], &metrics, window(), &BrainConfig::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn paused_creatives_are_ignored() {
        let unit = creative("Retired Promo", CreativeStatus::Paused);
        let metrics = history(unit.id, window(), 40, 4.5);
        let findings = detect(&[unit], &metrics, window(), &BrainConfig::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn thin_history_is_skipped_not_flagged() {
        let unit = creative("Fresh Launch", CreativeStatus::Active);
        let w = window();
        // only 4 recent days, nothing in the baseline span
        let metrics: Vec<CreativeDailyMetric> = (0..4)
            .map(|offset| CreativeDailyMetric {
                creative_id: unit.id,
                date: w.end - Duration::days(offset),
                spend: 400.0,
                revenue: 100.0,
                impressions: 20_000,
                clicks: 1000,
                conversions: 10,
                frequency: 5.0,
            })
            .collect();
        let findings = detect(&[unit], &metrics, w, &BrainConfig::default());
        assert!(findings.is_empty());
    }
}
