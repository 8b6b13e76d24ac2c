use anyhow::Context;
use serde::Serialize;
use tokio::task;

use crate::config::BrainConfig;
use crate::decay::{self, DecayFinding};
use crate::drift::{self, DriftFinding};
use crate::fatigue::{self, FatigueFinding};
use crate::models::{
    AnalysisWindow, Channel, Cohort, Creative, CreativeDailyMetric, DailyMetric, Severity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleOutput {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub fatigue_findings: Vec<FatigueFinding>,
    pub decay_findings: Vec<DecayFinding>,
    pub drift_finding: Option<DriftFinding>,
}

// Per-finding contributions to the global score, with per-category caps so
// one noisy detector cannot saturate the scale on its own.
const FATIGUE_POINTS: [u32; 3] = [5, 10, 15];
const FATIGUE_CAP: u32 = 40;
const DECAY_POINTS: [u32; 3] = [6, 12, 20];
const DECAY_CAP: u32 = 40;
const DRIFT_POINTS: [u32; 3] = [8, 15, 25];

/// Runs the three risk detectors as independent blocking tasks and folds
/// their findings into one global score. Scoring touches no clock and no
/// randomness; identical inputs reproduce the score bit for bit.
pub async fn assess(
    channels: &[Channel],
    metrics: &[DailyMetric],
    creatives: &[Creative],
    creative_metrics: &[CreativeDailyMetric],
    cohorts: &[Cohort],
    window: AnalysisWindow,
    config: &BrainConfig,
) -> anyhow::Result<OracleOutput> {
    let fatigue_task = task::spawn_blocking({
        let creatives = creatives.to_vec();
        let creative_metrics = creative_metrics.to_vec();
        let config = config.clone();
        move || fatigue::detect(&creatives, &creative_metrics, window, &config)
    });
    let decay_task = task::spawn_blocking({
        let channels = channels.to_vec();
        let metrics = metrics.to_vec();
        let config = config.clone();
        move || decay::detect(&channels, &metrics, window, &config)
    });
    let drift_task = task::spawn_blocking({
        let cohorts = cohorts.to_vec();
        let config = config.clone();
        move || drift::detect(&cohorts, &config)
    });

    let (fatigue_findings, decay_findings, drift_finding) =
        tokio::try_join!(fatigue_task, decay_task, drift_task)
            .context("risk detector task failed")?;

    let fatigue_severities: Vec<Severity> =
        fatigue_findings.iter().map(|f| f.severity).collect();
    let decay_severities: Vec<Severity> = decay_findings.iter().map(|f| f.severity).collect();
    let risk_score = score(
        &fatigue_severities,
        &decay_severities,
        drift_finding.as_ref().map(|f| f.severity),
    );

    Ok(OracleOutput {
        risk_score,
        risk_level: level_for(risk_score),
        fatigue_findings,
        decay_findings,
        drift_finding,
    })
}

pub fn score(fatigue: &[Severity], decay: &[Severity], drift: Option<Severity>) -> u32 {
    let fatigue_total: u32 = fatigue.iter().map(|s| points(&FATIGUE_POINTS, *s)).sum();
    let decay_total: u32 = decay.iter().map(|s| points(&DECAY_POINTS, *s)).sum();
    let drift_total = drift.map(|s| points(&DRIFT_POINTS, s)).unwrap_or(0);

    (fatigue_total.min(FATIGUE_CAP) + decay_total.min(DECAY_CAP) + drift_total).min(100)
}

fn points(table: &[u32; 3], severity: Severity) -> u32 {
    match severity {
        Severity::Low => table[0],
        Severity::Medium => table[1],
        Severity::High => table[2],
    }
}

pub fn level_for(score: u32) -> RiskLevel {
    if score >= 65 {
        RiskLevel::Red
    } else if score >= 30 {
        RiskLevel::Yellow
    } else {
        RiskLevel::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    #[test]
    fn level_boundaries_are_exact() {
        assert_eq!(level_for(0), RiskLevel::Green);
        assert_eq!(level_for(29), RiskLevel::Green);
        assert_eq!(level_for(30), RiskLevel::Yellow);
        assert_eq!(level_for(64), RiskLevel::Yellow);
        assert_eq!(level_for(65), RiskLevel::Red);
        assert_eq!(level_for(100), RiskLevel::Red);
    }

    #[test]
    fn category_caps_hold_under_finding_floods() {
        let many_high = vec![Severity::High; 10];
        // both capped categories at 40, no drift
        assert_eq!(score(&many_high, &many_high, None), 80);
        assert_eq!(score(&many_high, &many_high, Some(Severity::High)), 100);
    }

    #[test]
    fn score_never_leaves_unit_range() {
        assert_eq!(score(&[], &[], None), 0);
        let flood = vec![Severity::High; 50];
        assert!(score(&flood, &flood, Some(Severity::High)) <= 100);
    }

    #[test]
    fn mixed_findings_sum_their_points() {
        let fatigue = [Severity::High, Severity::Low];
        let decay = [Severity::Medium];
        // 15 + 5 + 12 + 15
        assert_eq!(score(&fatigue, &decay, Some(Severity::Medium)), 47);
    }

    fn channel(name: &str, platform: Platform) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            platform,
            is_active: true,
        }
    }

    fn steady(channel_id: Uuid, w: AnalysisWindow, spend: f64, roas: f64) -> Vec<DailyMetric> {
        (0..30)
            .map(|offset| DailyMetric {
                channel_id,
                date: w.start() + Duration::days(offset),
                spend,
                revenue: spend * roas,
                impressions: 10_000,
                clicks: 200,
                conversions: 10,
                frequency: 2.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn declining_channel_triggers_one_decay_finding() {
        let w = AnalysisWindow::trailing(NaiveDate::from_ymd_opt(2026, 3, 30).unwrap(), 30);
        let meta = channel("Meta", Platform::PaidSocial);
        let google = channel("Google", Platform::PaidSearch);
        let tiktok = channel("TikTok", Platform::ShortVideo);

        let mut metrics = steady(meta.id, w, 100.0, 3.65);
        metrics.extend(steady(google.id, w, 100.0, 2.35));
        for offset in 0..30 {
            let date = w.start() + Duration::days(offset);
            let (spend, roas) = if date >= w.recent_start() {
                (200.0, 1.9)
            } else {
                (100.0, 2.8)
            };
            metrics.push(DailyMetric {
                channel_id: tiktok.id,
                date,
                spend,
                revenue: spend * roas,
                impressions: 10_000,
                clicks: 200,
                conversions: 10,
                frequency: 2.0,
            });
        }

        let output = assess(
            &[meta, google, tiktok.clone()],
            &metrics,
            &[],
            &[],
            &[],
            w,
            &BrainConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.decay_findings.len(), 1);
        let finding = &output.decay_findings[0];
        assert_eq!(finding.channel_id, tiktok.id);
        assert!((finding.baseline_roas - 2.8).abs() < 1e-6);
        assert!((finding.recent_roas - 1.9).abs() < 1e-6);
        assert!((finding.decay_pct - 32.14).abs() < 0.1);
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(output.risk_score, 12);
        assert_eq!(output.risk_level, RiskLevel::Green);
    }

    #[tokio::test]
    async fn identical_inputs_reproduce_the_score() {
        let w = AnalysisWindow::trailing(NaiveDate::from_ymd_opt(2026, 3, 30).unwrap(), 30);
        let ch = channel("Meta", Platform::PaidSocial);
        let mut metrics = Vec::new();
        for offset in 0..30 {
            let date = w.start() + Duration::days(offset);
            let roas = if date >= w.recent_start() { 1.5 } else { 3.0 };
            metrics.push(DailyMetric {
                channel_id: ch.id,
                date,
                spend: 100.0,
                revenue: 100.0 * roas,
                impressions: 10_000,
                clicks: 200,
                conversions: 10,
                frequency: 2.0,
            });
        }
        let channels = vec![ch];
        let config = BrainConfig::default();
        let first = assess(&channels, &metrics, &[], &[], &[], w, &config)
            .await
            .unwrap();
        let second = assess(&channels, &metrics, &[], &[], &[], w, &config)
            .await
            .unwrap();
        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(first.risk_level, second.risk_level);
    }
}
