use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BrainConfig;
use crate::curiosity::{self, CuriosityOutput};
use crate::memory::{self, MemoryOutput};
use crate::models::{
    AnalysisWindow, Channel, Cohort, Creative, CreativeDailyMetric, DailyMetric, Diagnostic,
};
use crate::oracle::{self, OracleOutput};
use crate::suggest::SuggestProvider;

/// Already-materialized rows for one organization and one window. The
/// caller scopes and orders them; the core never reaches back to storage.
#[derive(Debug, Clone, Default)]
pub struct BrainInputs {
    pub channels: Vec<Channel>,
    pub metrics: Vec<DailyMetric>,
    pub creatives: Vec<Creative>,
    pub creative_metrics: Vec<CreativeDailyMetric>,
    pub cohorts: Vec<Cohort>,
}

/// One full cycle's output: attributed truth, risk signals, ranked
/// actions. A plain serializable value; persistence is the caller's call.
#[derive(Debug, Clone, Serialize)]
pub struct BrainCycle {
    pub memory: MemoryOutput,
    pub oracle: OracleOutput,
    pub curiosity: CuriosityOutput,
    pub computed_at: DateTime<Utc>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Sequences Memory, Oracle, and Curiosity for one invocation. Stateless
/// across calls; invalid rows are scrubbed into diagnostics up front so
/// one bad row cannot fail the whole organization.
pub async fn run_brain_cycle<C: SuggestProvider>(
    inputs: &BrainInputs,
    window: AnalysisWindow,
    config: &BrainConfig,
    provider: Option<&C>,
) -> anyhow::Result<BrainCycle> {
    let (inputs, diagnostics) = scrub(inputs);
    for diagnostic in &diagnostics {
        warn!(scope = %diagnostic.scope, "{}", diagnostic.message);
    }

    let memory = memory::remember(
        &inputs.channels,
        &inputs.metrics,
        &inputs.cohorts,
        window,
        config,
    );
    info!(
        blended_roas = memory.blended_roas,
        channels = memory.channels.len(),
        "memory stage complete"
    );

    let oracle = oracle::assess(
        &inputs.channels,
        &inputs.metrics,
        &inputs.creatives,
        &inputs.creative_metrics,
        &inputs.cohorts,
        window,
        config,
    )
    .await?;
    info!(
        risk_score = oracle.risk_score,
        risk_level = ?oracle.risk_level,
        "oracle stage complete"
    );

    let curiosity = curiosity::recommend(&memory, &oracle, provider, config).await;
    info!(
        actions = curiosity.actions.len(),
        total_opportunity = curiosity.total_opportunity,
        "curiosity stage complete"
    );

    Ok(BrainCycle {
        memory,
        oracle,
        curiosity,
        computed_at: Utc::now(),
        diagnostics,
    })
}

/// Drops rows the pipeline cannot trust: negative money, references to
/// unknown channels or creatives, duplicate (entity, date) observations.
/// Each exclusion becomes a diagnostic, never an error.
fn scrub(inputs: &BrainInputs) -> (BrainInputs, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let channel_ids: HashSet<Uuid> = inputs.channels.iter().map(|c| c.id).collect();
    let creative_ids: HashSet<Uuid> = inputs.creatives.iter().map(|c| c.id).collect();

    let mut metrics = Vec::with_capacity(inputs.metrics.len());
    let mut seen: HashSet<(Uuid, chrono::NaiveDate)> = HashSet::new();
    for row in &inputs.metrics {
        if row.spend < 0.0 || row.revenue < 0.0 {
            diagnostics.push(Diagnostic::new(
                "daily_metrics",
                format!(
                    "negative spend/revenue on {} for channel {}; row excluded",
                    row.date, row.channel_id
                ),
            ));
            continue;
        }
        if !channel_ids.contains(&row.channel_id) {
            diagnostics.push(Diagnostic::new(
                "daily_metrics",
                format!(
                    "row on {} references unknown channel {}; row excluded",
                    row.date, row.channel_id
                ),
            ));
            continue;
        }
        if !seen.insert((row.channel_id, row.date)) {
            diagnostics.push(Diagnostic::new(
                "daily_metrics",
                format!(
                    "duplicate observation for channel {} on {}; first kept",
                    row.channel_id, row.date
                ),
            ));
            continue;
        }
        metrics.push(row.clone());
    }

    let mut creative_metrics = Vec::with_capacity(inputs.creative_metrics.len());
    let mut seen_creative: HashSet<(Uuid, chrono::NaiveDate)> = HashSet::new();
    for row in &inputs.creative_metrics {
        if row.spend < 0.0 || row.revenue < 0.0 {
            diagnostics.push(Diagnostic::new(
                "creative_daily_metrics",
                format!(
                    "negative spend/revenue on {} for creative {}; row excluded",
                    row.date, row.creative_id
                ),
            ));
            continue;
        }
        if !creative_ids.contains(&row.creative_id) {
            diagnostics.push(Diagnostic::new(
                "creative_daily_metrics",
                format!(
                    "row on {} references unknown creative {}; row excluded",
                    row.date, row.creative_id
                ),
            ));
            continue;
        }
        if !seen_creative.insert((row.creative_id, row.date)) {
            diagnostics.push(Diagnostic::new(
                "creative_daily_metrics",
                format!(
                    "duplicate observation for creative {} on {}; first kept",
                    row.creative_id, row.date
                ),
            ));
            continue;
        }
        creative_metrics.push(row.clone());
    }

    let mut cohorts = Vec::with_capacity(inputs.cohorts.len());
    for cohort in &inputs.cohorts {
        if cohort.customer_count < 0 || cohort.ltv_90d < 0.0 {
            diagnostics.push(Diagnostic::new(
                "cohorts",
                format!("cohort {} carries negative values; excluded", cohort.month),
            ));
            continue;
        }
        cohorts.push(cohort.clone());
    }

    (
        BrainInputs {
            channels: inputs.channels.clone(),
            metrics,
            creatives: inputs.creatives.clone(),
            creative_metrics,
            cohorts,
        },
        diagnostics,
    )
}
