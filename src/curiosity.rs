use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{ChannelStatus, TrendDirection};
use crate::config::BrainConfig;
use crate::memory::{round_currency, MemoryOutput};
use crate::models::Severity;
use crate::oracle::OracleOutput;
use crate::suggest::SuggestProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PauseCreative,
    ShiftBudget,
    IncreaseBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn weight(&self) -> u32 {
        match self {
            Tier::Low => 1,
            Tier::Medium => 2,
            Tier::High => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Tier> {
        match value {
            "low" => Some(Tier::Low),
            "medium" => Some(Tier::Medium),
            "high" => Some(Tier::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub action_type: ActionType,
    pub title: String,
    pub description: String,
    pub impact_estimate: f64,
    pub impact_label: String,
    pub confidence: Tier,
    pub urgency: Tier,
    pub score: u32,
    /// First entry is the primary entity and the dedup key for
    /// total-opportunity accounting.
    pub entity_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CuriosityOutput {
    pub actions: Vec<Action>,
    /// Impact summed over all candidates, deduplicated by primary entity,
    /// not just the shown top actions.
    pub total_opportunity: f64,
}

/// Converts Memory's channel standings and Oracle's findings into a ranked
/// action list. When a generative provider is configured it gets exactly
/// one bounded attempt to replace the rule-based candidates; any failure
/// falls back to the deterministic rules.
pub async fn recommend<C: SuggestProvider>(
    memory: &MemoryOutput,
    oracle: &OracleOutput,
    provider: Option<&C>,
    config: &BrainConfig,
) -> CuriosityOutput {
    let mut candidates = rule_candidates(memory, oracle, config);

    if let Some(provider) = provider {
        let budget = Duration::from_secs(config.suggest_timeout_secs);
        match timeout(budget, provider.suggest(&memory.channels, oracle)).await {
            Ok(Ok(actions)) if !actions.is_empty() => {
                info!(count = actions.len(), "using generative candidates");
                candidates = actions;
            }
            Ok(Ok(_)) => {
                warn!("generative provider returned no actions; using rule-based candidates");
            }
            Ok(Err(error)) => {
                warn!(%error, "generative provider failed; using rule-based candidates");
            }
            Err(_) => {
                warn!(
                    timeout_secs = config.suggest_timeout_secs,
                    "generative provider timed out; using rule-based candidates"
                );
            }
        }
    }

    rank(candidates, config)
}

/// Deterministic candidate generation from the stage outputs.
pub fn rule_candidates(
    memory: &MemoryOutput,
    oracle: &OracleOutput,
    config: &BrainConfig,
) -> Vec<Action> {
    let mut candidates = Vec::new();

    // Medium/high fatigue: pause the creative. Impact is the monthly spend
    // at risk scaled by the relative CVR decline.
    for finding in &oracle.fatigue_findings {
        if finding.severity == Severity::Low {
            continue;
        }
        let monthly_spend = finding.recent_spend / 14.0 * 30.0;
        let cvr_decline = if finding.baseline_cvr > 0.0 {
            ((finding.baseline_cvr - finding.recent_cvr) / finding.baseline_cvr).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let impact = round_currency(monthly_spend * cvr_decline);
        candidates.push(Action {
            action_type: ActionType::PauseCreative,
            title: format!("Pause fatigued creative \"{}\"", finding.creative_name),
            description: format!(
                "Conversion rate slid from {:.2}% to {:.2}% while frequency reached {:.1}. {}.",
                finding.baseline_cvr * 100.0,
                finding.recent_cvr * 100.0,
                finding.recent_frequency,
                finding.recommended_action
            ),
            impact_estimate: impact,
            impact_label: format!("~${impact:.0}/month saved"),
            confidence: if finding.probability >= config.fatigue_high_threshold {
                Tier::High
            } else {
                Tier::Medium
            },
            urgency: severity_tier(finding.severity),
            score: 0,
            entity_ids: vec![finding.creative_id, finding.channel_id],
        });
    }

    // Every decay finding: shift budget toward the current top winner.
    // Impact is the decayed channel's monthly spend times the ROAS gap to
    // the winner.
    if let Some(winner) = memory.top_winner() {
        for finding in &oracle.decay_findings {
            if finding.channel_id == winner.channel_id {
                continue;
            }
            let monthly_spend = finding.recent_spend / 14.0 * 30.0;
            let impact =
                round_currency((monthly_spend * (winner.roas - finding.recent_roas)).max(0.0));
            candidates.push(Action {
                action_type: ActionType::ShiftBudget,
                title: format!(
                    "Shift budget from {} to {}",
                    finding.channel_name, winner.name
                ),
                description: format!(
                    "{} ROAS decayed {:.0}% ({:.2}x to {:.2}x) while {} holds {:.2}x. {}.",
                    finding.channel_name,
                    finding.decay_pct,
                    finding.baseline_roas,
                    finding.recent_roas,
                    winner.name,
                    winner.roas,
                    finding.recommended_action
                ),
                impact_estimate: impact,
                impact_label: format!("~${impact:.0}/month recovered"),
                confidence: if finding.decay_pct >= config.decay_high_threshold {
                    Tier::High
                } else {
                    Tier::Medium
                },
                urgency: severity_tier(finding.severity),
                score: 0,
                entity_ids: vec![finding.channel_id, winner.channel_id],
            });
        }
    }

    // Winners with no offsetting risk finding: scale them up. Impact is the
    // extra monthly revenue from adding the configured headroom at the
    // channel's current ROAS.
    for summary in &memory.channels {
        if summary.status != ChannelStatus::Winner {
            continue;
        }
        let has_decay = oracle
            .decay_findings
            .iter()
            .any(|f| f.channel_id == summary.channel_id);
        let has_fatigue = oracle
            .fatigue_findings
            .iter()
            .any(|f| f.channel_id == summary.channel_id && f.severity != Severity::Low);
        if has_decay || has_fatigue {
            continue;
        }
        let impact = round_currency(summary.spend * config.budget_headroom * summary.roas);
        candidates.push(Action {
            action_type: ActionType::IncreaseBudget,
            title: format!("Increase budget on {}", summary.name),
            description: format!(
                "{} runs {:.2}x against a blended {:.2}x with no active risk findings; \
                 an extra {:.0}% budget should compound the lead.",
                summary.name,
                summary.roas,
                memory.blended_roas,
                config.budget_headroom * 100.0
            ),
            impact_estimate: impact,
            impact_label: format!("~${impact:.0}/month additional revenue"),
            confidence: match summary.trend {
                TrendDirection::Up => Tier::High,
                TrendDirection::Stable => Tier::Medium,
                TrendDirection::Down => Tier::Low,
            },
            urgency: Tier::Medium,
            score: 0,
            entity_ids: vec![summary.channel_id],
        });
    }

    candidates
}

/// Composite score = urgency weight x 10 + confidence weight. Ties go to
/// the larger absolute impact, then to first-seen input order.
pub fn rank(candidates: Vec<Action>, config: &BrainConfig) -> CuriosityOutput {
    let mut scored: Vec<(usize, Action)> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, mut action)| {
            action.score = action.urgency.weight() * 10 + action.confidence.weight();
            (index, action)
        })
        .collect();

    scored.sort_by(|(ia, a), (ib, b)| {
        b.score
            .cmp(&a.score)
            .then_with(|| {
                b.impact_estimate
                    .abs()
                    .total_cmp(&a.impact_estimate.abs())
            })
            .then_with(|| ia.cmp(ib))
    });

    let total_opportunity = total_opportunity(scored.iter().map(|(_, a)| a));
    let actions: Vec<Action> = scored
        .into_iter()
        .map(|(_, action)| action)
        .take(config.top_actions)
        .collect();

    CuriosityOutput {
        actions,
        total_opportunity,
    }
}

/// Sums candidate impacts deduplicated by primary entity, keeping the
/// larger impact when one entity backs two candidates.
fn total_opportunity<'a>(actions: impl Iterator<Item = &'a Action>) -> f64 {
    let mut by_entity: BTreeMap<Uuid, f64> = BTreeMap::new();
    let mut anonymous = 0.0;
    for action in actions {
        match action.entity_ids.first() {
            Some(entity) => {
                let entry = by_entity.entry(*entity).or_insert(0.0);
                if action.impact_estimate > *entry {
                    *entry = action.impact_estimate;
                }
            }
            None => anonymous += action.impact_estimate,
        }
    }
    by_entity.values().sum::<f64>() + anonymous
}

fn severity_tier(severity: Severity) -> Tier {
    match severity {
        Severity::Low => Tier::Low,
        Severity::Medium => Tier::Medium,
        Severity::High => Tier::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::SuggestError;
    use std::future::Future;

    fn action(urgency: Tier, confidence: Tier, impact: f64, entity: Uuid) -> Action {
        Action {
            action_type: ActionType::IncreaseBudget,
            title: "test".to_string(),
            description: String::new(),
            impact_estimate: impact,
            impact_label: format!("~${impact:.0}/month"),
            confidence,
            urgency,
            score: 0,
            entity_ids: vec![entity],
        }
    }

    #[test]
    fn ranking_orders_by_urgency_then_confidence() {
        let a = action(Tier::High, Tier::Low, 100.0, Uuid::new_v4());
        let b = action(Tier::Medium, Tier::High, 5000.0, Uuid::new_v4());
        let c = action(Tier::High, Tier::High, 10.0, Uuid::new_v4());
        let output = rank(vec![a, b, c], &BrainConfig::default());
        assert_eq!(output.actions[0].score, 33);
        assert_eq!(output.actions[1].score, 31);
        assert_eq!(output.actions[2].score, 23);
    }

    #[test]
    fn ties_break_on_impact_then_input_order() {
        let first = action(Tier::High, Tier::Medium, 100.0, Uuid::new_v4());
        let bigger = action(Tier::High, Tier::Medium, 900.0, Uuid::new_v4());
        let twin_entity = Uuid::new_v4();
        let twin_a = action(Tier::High, Tier::Medium, 100.0, twin_entity);
        let output = rank(
            vec![first.clone(), bigger.clone(), twin_a],
            &BrainConfig::default(),
        );
        assert_eq!(output.actions[0].impact_estimate, 900.0);
        // equal score and impact: first-seen entity wins
        assert_eq!(output.actions[1].entity_ids, first.entity_ids);
    }

    #[test]
    fn total_opportunity_counts_all_candidates() {
        let candidates: Vec<Action> = (0..5)
            .map(|i| action(Tier::Low, Tier::Low, 100.0 * (i + 1) as f64, Uuid::new_v4()))
            .collect();
        let output = rank(candidates, &BrainConfig::default());
        assert_eq!(output.actions.len(), 3);
        let shown: f64 = output.actions.iter().map(|a| a.impact_estimate).sum();
        assert_eq!(output.total_opportunity, 1500.0);
        assert!(output.total_opportunity >= shown);
    }

    #[test]
    fn duplicate_entities_keep_the_larger_impact() {
        let entity = Uuid::new_v4();
        let small = action(Tier::High, Tier::High, 200.0, entity);
        let large = action(Tier::Low, Tier::Low, 800.0, entity);
        let output = rank(vec![small, large], &BrainConfig::default());
        assert_eq!(output.total_opportunity, 800.0);
    }

    struct FailingProvider;

    impl SuggestProvider for FailingProvider {
        fn suggest(
            &self,
            _channels: &[crate::aggregate::ChannelSummary],
            _oracle: &OracleOutput,
        ) -> impl Future<Output = Result<Vec<Action>, SuggestError>> + Send {
            async { Err(SuggestError::Unavailable) }
        }
    }

    struct CannedProvider(Vec<Action>);

    impl SuggestProvider for CannedProvider {
        fn suggest(
            &self,
            _channels: &[crate::aggregate::ChannelSummary],
            _oracle: &OracleOutput,
        ) -> impl Future<Output = Result<Vec<Action>, SuggestError>> + Send {
            let actions = self.0.clone();
            async move { Ok(actions) }
        }
    }

    fn empty_memory() -> MemoryOutput {
        MemoryOutput {
            total_spend: 0.0,
            total_revenue: 0.0,
            blended_roas: 0.0,
            ltv_adjusted_revenue: 0.0,
            ltv_adjusted_roas: 0.0,
            ltv: crate::ltv::estimate(&[], &BrainConfig::default()),
            channels: Vec::new(),
        }
    }

    fn empty_oracle() -> OracleOutput {
        OracleOutput {
            risk_score: 0,
            risk_level: crate::oracle::level_for(0),
            fatigue_findings: Vec::new(),
            decay_findings: Vec::new(),
            drift_finding: None,
        }
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_rules() {
        let memory = empty_memory();
        let oracle = empty_oracle();
        let config = BrainConfig::default();
        let with_failure =
            recommend(&memory, &oracle, Some(&FailingProvider), &config).await;
        let without = recommend(&memory, &oracle, None::<&FailingProvider>, &config).await;
        assert_eq!(with_failure.actions.len(), without.actions.len());
        assert_eq!(with_failure.total_opportunity, without.total_opportunity);
    }

    #[tokio::test]
    async fn provider_actions_replace_rule_candidates() {
        let memory = empty_memory();
        let oracle = empty_oracle();
        let canned = CannedProvider(vec![action(
            Tier::High,
            Tier::High,
            1234.0,
            Uuid::new_v4(),
        )]);
        let output = recommend(&memory, &oracle, Some(&canned), &BrainConfig::default()).await;
        assert_eq!(output.actions.len(), 1);
        assert_eq!(output.actions[0].impact_estimate, 1234.0);
        assert_eq!(output.actions[0].score, 33);
    }

    #[tokio::test]
    async fn empty_provider_response_keeps_rule_candidates() {
        let memory = empty_memory();
        let oracle = empty_oracle();
        let canned = CannedProvider(Vec::new());
        let config = BrainConfig::default();
        let output = recommend(&memory, &oracle, Some(&canned), &config).await;
        let baseline = recommend(&memory, &oracle, None::<&CannedProvider>, &config).await;
        assert_eq!(output.actions.len(), baseline.actions.len());
    }
}
