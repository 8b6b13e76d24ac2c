use std::fmt::Write;

use crate::brain::BrainCycle;
use crate::oracle::RiskLevel;

/// Renders one computed cycle as a markdown briefing.
pub fn build_report(organization: &str, cycle: &BrainCycle) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Marketing Brain Briefing");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        organization,
        cycle.computed_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Performance");
    let memory = &cycle.memory;
    let _ = writeln!(
        output,
        "- Spend ${:.0} / revenue ${:.0} ({:.2}x blended ROAS)",
        memory.total_spend, memory.total_revenue, memory.blended_roas
    );
    if memory.ltv.sufficient {
        let _ = writeln!(
            output,
            "- LTV-adjusted ROAS {:.2}x (factor {:.2}, {} vs {})",
            memory.ltv_adjusted_roas,
            memory.ltv.factor,
            memory.ltv.recent_month.as_deref().unwrap_or("?"),
            memory.ltv.baseline_month.as_deref().unwrap_or("?"),
        );
    } else {
        let _ = writeln!(output, "- LTV adjustment unavailable (not enough cohorts)");
    }
    for channel in &memory.channels {
        let _ = writeln!(
            output,
            "- {}: {:.2}x ROAS, {:.0}% of revenue, trend {:?}, {:?}",
            channel.name,
            channel.roas,
            channel.revenue_share * 100.0,
            channel.trend,
            channel.status
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk");
    let oracle = &cycle.oracle;
    let _ = writeln!(
        output,
        "- Global risk {} ({})",
        oracle.risk_score,
        match oracle.risk_level {
            RiskLevel::Green => "green",
            RiskLevel::Yellow => "yellow",
            RiskLevel::Red => "red",
        }
    );
    for finding in &oracle.fatigue_findings {
        let _ = writeln!(
            output,
            "- Creative fatigue ({:?}): {} at {:.0}% probability; {}",
            finding.severity,
            finding.creative_name,
            finding.probability * 100.0,
            finding.recommended_action
        );
    }
    for finding in &oracle.decay_findings {
        let _ = writeln!(
            output,
            "- ROI decay ({:?}): {} slid {:.0}% ({:.2}x to {:.2}x); {}",
            finding.severity,
            finding.channel_name,
            finding.decay_pct,
            finding.baseline_roas,
            finding.recent_roas,
            finding.recommended_action
        );
    }
    if let Some(finding) = &oracle.drift_finding {
        let _ = writeln!(
            output,
            "- LTV drift ({:?}): {:+.1}% ({} vs {}); {}",
            finding.severity,
            finding.drift_pct,
            finding.recent_month,
            finding.baseline_month,
            finding.recommended_action
        );
    }
    if oracle.fatigue_findings.is_empty()
        && oracle.decay_findings.is_empty()
        && oracle.drift_finding.is_none()
    {
        let _ = writeln!(output, "- No active risk findings.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Actions");
    if cycle.curiosity.actions.is_empty() {
        let _ = writeln!(output, "No actions recommended for this window.");
    } else {
        for (rank, action) in cycle.curiosity.actions.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. **{}** ({}) — {}",
                rank + 1,
                action.title,
                action.impact_label,
                action.description
            );
        }
        let _ = writeln!(
            output,
            "\nTotal opportunity across all candidates: ~${:.0}/month",
            cycle.curiosity.total_opportunity
        );
    }

    if !cycle.diagnostics.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Warnings");
        for diagnostic in &cycle.diagnostics {
            let _ = writeln!(output, "- [{}] {}", diagnostic.scope, diagnostic.message);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{run_brain_cycle, BrainInputs};
    use crate::config::BrainConfig;
    use crate::models::AnalysisWindow;
    use crate::suggest::HttpSuggestClient;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn empty_cycle_renders_without_findings() {
        let window =
            AnalysisWindow::trailing(NaiveDate::from_ymd_opt(2026, 3, 30).unwrap(), 30);
        let cycle = run_brain_cycle(
            &BrainInputs::default(),
            window,
            &BrainConfig::default(),
            None::<&HttpSuggestClient>,
        )
        .await
        .unwrap();
        let report = build_report("Lumen Threads", &cycle);
        assert!(report.contains("# Marketing Brain Briefing"));
        assert!(report.contains("No active risk findings."));
        assert!(report.contains("No actions recommended"));
        assert!(report.contains("LTV adjustment unavailable"));
    }
}
