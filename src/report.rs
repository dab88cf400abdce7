//! Dashboard report
//!
//! Assembles the values the dashboard page displays for one selected metric:
//! top-N ranking, summary statistics, the priority cohort, and the impact
//! analysis averaged over that same cohort. Output is plain serializable data
//! plus a text rendering for the terminal.

use crate::aggregator::{self, MetricSummary, Ranking, ScoreOptions};
use crate::catalog::{MetricCatalog, MetricLabel};
use crate::dataset::Dataset;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub ranking_top_n: usize,
    pub priority_top_n: usize,
    pub options: ScoreOptions,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            ranking_top_n: crate::config::DEFAULT_RANKING_TOP_N,
            priority_top_n: crate::config::DEFAULT_PRIORITY_TOP_N,
            options: ScoreOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub label: String,
    pub metric: String,
    /// Cohort mean; `None` when the column is absent or has no values in the cohort
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSection {
    pub title: String,
    pub entries: Vec<ImpactEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityAnalysis {
    pub metrics: Vec<String>,
    /// Top states by aggregate score, in [0, 1]
    pub cohort: Ranking,
    pub impact: Vec<ImpactSection>,
}

impl PriorityAnalysis {
    pub fn cohort_states(&self) -> Vec<&str> {
        self.cohort.iter().map(|r| r.state_code.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub metric: MetricLabel,
    pub ranking: Ranking,
    pub summary: MetricSummary,
    pub priority: PriorityAnalysis,
}

/// Rank states by aggregate score and average the impact metrics over the
/// resulting cohort.
///
/// Impact metrics missing from the dataset are reported without a value.
pub fn priority_analysis(
    dataset: &Dataset,
    catalog: &MetricCatalog,
    n: usize,
    options: &ScoreOptions,
) -> Result<PriorityAnalysis> {
    let cohort = aggregator::top_priority(dataset, &catalog.priority_metrics, n, options)?;
    let states: Vec<&str> = cohort.iter().map(|r| r.state_code.as_str()).collect();
    info!("Priority cohort: {}", states.join(", "));

    let mut impact = Vec::with_capacity(catalog.impact_groups.len());
    for group in &catalog.impact_groups {
        let mut entries = Vec::with_capacity(group.entries.len());
        for entry in &group.entries {
            let value = if dataset.has_metric(&entry.column) {
                aggregator::cohort_mean(dataset, &states, &entry.column)?
            } else {
                warn!("Impact metric '{}' is not in the dataset", entry.column);
                None
            };
            entries.push(ImpactEntry {
                label: entry.label.clone(),
                metric: entry.column.clone(),
                value,
            });
        }
        impact.push(ImpactSection {
            title: group.title.clone(),
            entries,
        });
    }

    Ok(PriorityAnalysis {
        metrics: catalog.priority_metrics.clone(),
        cohort,
        impact,
    })
}

/// Build the full report for `metric`
pub fn build_report(
    dataset: &Dataset,
    catalog: &MetricCatalog,
    metric: &str,
    settings: &ReportSettings,
) -> Result<DashboardReport> {
    let ranking = aggregator::top_n(dataset, metric, settings.ranking_top_n)?;
    let summary = aggregator::summarize(dataset, metric)?;
    let priority = priority_analysis(dataset, catalog, settings.priority_top_n, &settings.options)?;

    Ok(DashboardReport {
        generated_at: Utc::now(),
        metric: MetricLabel::new(metric, catalog.label(metric)),
        ranking,
        summary,
        priority,
    })
}

/// One decimal with a percent sign, as the dashboard shows metric values
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Aggregate scores are shown on a 0-100 scale
pub fn format_score(score: f64) -> String {
    format_percent(score * 100.0)
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_percent).unwrap_or_else(|| "n/a".to_string())
}

pub fn render_ranking(title: &str, ranking: &Ranking, format: fn(f64) -> String) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    for (i, entry) in ranking.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<6} {:>8}", i + 1, entry.state_code, format(entry.value));
    }
    out
}

pub fn render_summary(summary: &MetricSummary) -> String {
    format!(
        "Summary Statistics ({} states)\n  Mean:    {:>8}\n  Median:  {:>8}\n  Maximum: {:>8}\n  Minimum: {:>8}\n",
        summary.count,
        format_percent(summary.mean),
        format_percent(summary.median),
        format_percent(summary.max),
        format_percent(summary.min),
    )
}

pub fn render_priority(priority: &PriorityAnalysis) -> String {
    let mut out = render_ranking(
        &format!("Top {} Priority States", priority.cohort.len()),
        &priority.cohort,
        format_score,
    );
    for section in &priority.impact {
        let _ = writeln!(out, "\n{}", section.title);
        for entry in &section.entries {
            let _ = writeln!(out, "  {:<22} {:>8}", entry.label, format_optional(entry.value));
        }
    }
    out
}

impl DashboardReport {
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, " Health and Food Access Dashboard: {}", self.metric.label);
        let _ = writeln!(out, "{}", rule);
        out.push_str(&render_ranking(
            &format!("\nTop {} States", self.ranking.len()),
            &self.ranking,
            format_percent,
        ));
        out.push('\n');
        out.push_str(&render_summary(&self.summary));
        let _ = writeln!(out, "\n{}", "-".repeat(80));
        out.push_str(&render_priority(&self.priority));
        let _ = writeln!(out, "\nGenerated at {}", self.generated_at.to_rfc3339());
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
