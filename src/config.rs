use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Tunable thresholds for the brain pipeline. The defaults are the shipped
/// values; production deployments override them from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Fractional margin over blended ROAS before a channel is a winner.
    pub winner_margin: f64,
    /// Fractional margin under blended ROAS before a channel is a loser.
    pub loser_margin: f64,
    /// Relative ROAS delta between window thirds below which trend is stable.
    pub trend_noise: f64,

    /// Months back to look for the LTV baseline cohort.
    pub ltv_baseline_months_back: u32,
    /// Minimum customers for a cohort to be eligible for LTV comparison.
    pub ltv_min_customers: i64,

    /// Fatigue probability below which no finding is emitted.
    pub fatigue_watch_threshold: f64,
    /// Lower bounds of the medium and high fatigue bands.
    pub fatigue_medium_threshold: f64,
    pub fatigue_high_threshold: f64,
    /// Audience frequency above which the saturation signal activates.
    pub frequency_saturation: f64,
    /// Relative change that saturates the CVR/CPA fatigue signals.
    pub fatigue_signal_scale: f64,
    /// Minimum observed days in each window before a creative is scored.
    pub fatigue_min_days: usize,

    /// Decay percentage below which no finding is emitted.
    pub decay_low_threshold: f64,
    /// Lower bounds of the medium and high decay bands.
    pub decay_medium_threshold: f64,
    pub decay_high_threshold: f64,

    /// Absolute drift percentage below which no finding is emitted.
    pub drift_threshold: f64,
    /// Dead zone for the improving/declining/stable trend call.
    pub drift_dead_zone: f64,

    /// Actions surfaced by Curiosity.
    pub top_actions: usize,
    /// Fraction of a winner's budget assumed addable for increase_budget.
    pub budget_headroom: f64,

    /// Upper bound on the generative suggestion call, in seconds.
    pub suggest_timeout_secs: u64,
}

impl Default for BrainConfig {
    fn default() -> BrainConfig {
        BrainConfig {
            winner_margin: 0.15,
            loser_margin: 0.15,
            trend_noise: 0.05,
            ltv_baseline_months_back: 6,
            ltv_min_customers: 20,
            fatigue_watch_threshold: 0.5,
            fatigue_medium_threshold: 0.65,
            fatigue_high_threshold: 0.8,
            frequency_saturation: 3.0,
            fatigue_signal_scale: 0.5,
            fatigue_min_days: 5,
            decay_low_threshold: 10.0,
            decay_medium_threshold: 20.0,
            decay_high_threshold: 35.0,
            drift_threshold: 8.0,
            drift_dead_zone: 3.0,
            top_actions: 3,
            budget_headroom: 0.2,
            suggest_timeout_secs: 5,
        }
    }
}

impl BrainConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<BrainConfig> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: BrainConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_thresholds() {
        let config = BrainConfig::default();
        assert_eq!(config.winner_margin, 0.15);
        assert_eq!(config.decay_low_threshold, 10.0);
        assert_eq!(config.fatigue_watch_threshold, 0.5);
        assert_eq!(config.top_actions, 3);
    }

    #[test]
    fn partial_toml_overrides_keep_defaults_elsewhere() {
        let config: BrainConfig =
            toml::from_str("winner_margin = 0.25\ntop_actions = 5").unwrap();
        assert_eq!(config.winner_margin, 0.25);
        assert_eq!(config.top_actions, 5);
        assert_eq!(config.loser_margin, 0.15);
        assert_eq!(config.suggest_timeout_secs, 5);
    }
}
