//! Metric Aggregator
//!
//! Pure computation over a [`Dataset`]: per-metric summary statistics, top-N
//! rankings, and a priority score built from min-max normalized metrics.
//! Nothing here performs I/O or keeps state between calls.

use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Score given to every row of a zero-variance metric under the constant policy
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Descriptive statistics for one metric over its defined values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: String,
    /// Number of rows with a defined value
    pub count: usize,
    pub mean: f64,
    /// 50th percentile, averaging the two middle values for even counts
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// One entry of a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedState {
    pub state_code: String,
    pub value: f64,
}

/// Descending by value, ties kept in original row order
pub type Ranking = Vec<RankedState>;

/// A dataset row annotated with its aggregate score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub state_code: String,
    /// Mean of the row's normalized values; `None` when no metric contributed
    pub score: Option<f64>,
    /// Number of metrics with a defined value for this row
    pub contributing: usize,
}

/// How `aggregate_score` treats a metric whose max equals its min
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Fail with `DegenerateMetric`
    #[default]
    Reject,
    /// Every defined value of the metric normalizes to this constant
    Constant(f64),
}

impl DegeneratePolicy {
    pub fn neutral() -> Self {
        DegeneratePolicy::Constant(NEUTRAL_SCORE)
    }
}

impl fmt::Display for DegeneratePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegeneratePolicy::Reject => write!(f, "reject"),
            DegeneratePolicy::Constant(v) => write!(f, "constant:{}", v),
        }
    }
}

impl FromStr for DegeneratePolicy {
    type Err = DashboardError;

    /// Accepts `reject`, `constant` (0.5) or `constant:<value>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "reject" => Ok(DegeneratePolicy::Reject),
            "constant" => Ok(DegeneratePolicy::neutral()),
            other => {
                let value = other
                    .strip_prefix("constant:")
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| {
                        DashboardError::InvalidArgument(format!(
                            "Unknown degenerate policy '{}'",
                            other
                        ))
                    })?;
                Ok(DegeneratePolicy::Constant(value))
            }
        }
    }
}

/// Options for `aggregate_score` and `top_priority`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreOptions {
    pub degenerate: DegeneratePolicy,
}

impl ScoreOptions {
    pub fn with_policy(degenerate: DegeneratePolicy) -> Self {
        Self { degenerate }
    }
}

fn defined(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Position of `v` within `[min, max]`, halving first when the spread
/// overflows `f64`.
fn normalize(v: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    let scaled = if range.is_finite() {
        (v - min) / range
    } else {
        (v / 2.0 - min / 2.0) / (max / 2.0 - min / 2.0)
    };
    scaled.clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean.is_finite() {
        mean
    } else {
        values.iter().map(|v| v / n).sum()
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn check_n(n: usize) -> Result<()> {
    if n == 0 {
        return Err(DashboardError::InvalidArgument(
            "Ranking size must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Stable descending sort, truncated to `n`
fn rank_descending(mut entries: Vec<RankedState>, n: usize) -> Ranking {
    entries.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    entries.truncate(n);
    entries
}

/// Mean, median, min and max of `metric` over rows where it is defined.
pub fn summarize(dataset: &Dataset, metric: &str) -> Result<MetricSummary> {
    let values = defined(&dataset.metric_values(metric)?);
    if values.is_empty() {
        return Err(DashboardError::EmptyMetric(metric.to_string()));
    }

    let (min, max) = min_max(&values);
    let mean = mean(&values);

    Ok(MetricSummary {
        metric: metric.to_string(),
        count: values.len(),
        // summation error can push the mean of near-equal values past an end
        mean: mean.clamp(min, max),
        median: median(&values),
        min,
        max,
    })
}

/// The `n` rows with the largest value of `metric`.
///
/// Rows without a value are excluded. Fewer than `n` rows are returned when
/// fewer are defined.
pub fn top_n(dataset: &Dataset, metric: &str, n: usize) -> Result<Ranking> {
    let values = dataset.metric_values(metric)?;
    check_n(n)?;

    let entries = dataset
        .state_codes()
        .iter()
        .zip(values)
        .filter_map(|(state, value)| {
            value.map(|value| RankedState {
                state_code: state.clone(),
                value,
            })
        })
        .collect();

    Ok(rank_descending(entries, n))
}

/// Min-max normalize each metric and average the normalized values per row.
///
/// A row missing a metric is left out of that metric's min/max and its score
/// averages only the metrics it has. Rows come back in dataset order.
pub fn aggregate_score<S: AsRef<str>>(
    dataset: &Dataset,
    metrics: &[S],
    options: &ScoreOptions,
) -> Result<Vec<ScoredRow>> {
    let names: Vec<&str> = metrics.iter().map(|m| m.as_ref()).collect();
    if names.is_empty() {
        return Err(DashboardError::InvalidArgument(
            "At least one metric is required for an aggregate score".to_string(),
        ));
    }
    if !names.iter().all_unique() {
        return Err(DashboardError::InvalidArgument(format!(
            "Duplicate metrics in aggregate: {}",
            names.iter().duplicates().join(", ")
        )));
    }
    if let DegeneratePolicy::Constant(c) = options.degenerate {
        if !(0.0..=1.0).contains(&c) {
            return Err(DashboardError::InvalidArgument(format!(
                "Constant score {} is outside [0, 1]",
                c
            )));
        }
    }

    // Resolve every column before normalizing so an unknown name always wins.
    let columns = names
        .iter()
        .map(|&m| dataset.metric_values(m).map(|v| (m, v)))
        .collect::<Result<Vec<_>>>()?;

    let mut sums = vec![0.0; dataset.len()];
    let mut counts = vec![0usize; dataset.len()];

    for (metric, values) in &columns {
        let present = defined(values);
        if present.is_empty() {
            return Err(DashboardError::EmptyMetric(metric.to_string()));
        }
        let (min, max) = min_max(&present);

        let constant = if max == min {
            match options.degenerate {
                DegeneratePolicy::Reject => {
                    return Err(DashboardError::DegenerateMetric(metric.to_string()))
                }
                DegeneratePolicy::Constant(c) => {
                    warn!("Metric '{}' has zero variance, scoring it as {}", metric, c);
                    Some(c)
                }
            }
        } else {
            None
        };

        let missing = values.len() - present.len();
        if missing > 0 {
            debug!("Metric '{}': {} rows excluded from normalization", metric, missing);
        }

        for (idx, value) in values.iter().enumerate() {
            if let Some(v) = value {
                sums[idx] += match constant {
                    Some(c) => c,
                    None => normalize(*v, min, max),
                };
                counts[idx] += 1;
            }
        }
    }

    Ok(dataset
        .state_codes()
        .iter()
        .zip(sums.into_iter().zip(counts))
        .map(|(state, (sum, count))| ScoredRow {
            state_code: state.clone(),
            score: (count > 0).then(|| sum / count as f64),
            contributing: count,
        })
        .collect())
}

/// Aggregate score followed by a top-`n` ranking of the scored rows.
pub fn top_priority<S: AsRef<str>>(
    dataset: &Dataset,
    metrics: &[S],
    n: usize,
    options: &ScoreOptions,
) -> Result<Ranking> {
    let scored = aggregate_score(dataset, metrics, options)?;
    check_n(n)?;

    let entries = scored
        .into_iter()
        .filter_map(|row| {
            row.score.map(|value| RankedState {
                state_code: row.state_code,
                value,
            })
        })
        .collect();

    Ok(rank_descending(entries, n))
}

/// Mean of `metric` over the given states, skipping missing values.
///
/// Returns `None` when no state in the cohort has a value.
pub fn cohort_mean<S: AsRef<str>>(
    dataset: &Dataset,
    states: &[S],
    metric: &str,
) -> Result<Option<f64>> {
    let values = dataset.metric_values(metric)?;
    let cohort: Vec<f64> = states
        .iter()
        .filter_map(|state| match dataset.position(state.as_ref()) {
            Some(idx) => values[idx],
            None => {
                warn!("State '{}' is not in the dataset", state.as_ref());
                None
            }
        })
        .collect();

    if cohort.is_empty() {
        return Ok(None);
    }
    Ok(Some(cohort.iter().sum::<f64>() / cohort.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn dataset(frame: DataFrame) -> Dataset {
        Dataset::from_frame(frame, "STATE").unwrap()
    }

    #[test]
    fn test_summarize_odd_count() {
        let d = dataset(df!["STATE" => ["A", "B", "C"], "metric1" => [10.0, 20.0, 30.0]].unwrap());
        let s = summarize(&d, "metric1").unwrap();
        assert_eq!(s.count, 3);
        assert_eq!((s.mean, s.median, s.min, s.max), (20.0, 20.0, 10.0, 30.0));
    }

    #[test]
    fn test_summarize_even_count_skips_missing() {
        let d = dataset(
            df!["STATE" => ["A", "B", "C", "D", "E"], "m" => [Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)]]
                .unwrap(),
        );
        let s = summarize(&d, "m").unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.mean, 2.5);
        assert_eq!((s.min, s.max), (1.0, 4.0));
    }

    #[test]
    fn test_summarize_empty_metric() {
        let d = dataset(df!["STATE" => ["A", "B"], "m" => [None::<f64>, None]].unwrap());
        assert!(matches!(summarize(&d, "m"), Err(DashboardError::EmptyMetric(_))));
    }

    #[test]
    fn test_top_n_stable_ties_and_truncation() {
        let d = dataset(
            df!["STATE" => ["A", "B", "C", "D"], "m" => [Some(5.0), Some(9.0), None, Some(5.0)]].unwrap(),
        );
        let ranking = top_n(&d, "m", 10).unwrap();
        let order: Vec<&str> = ranking.iter().map(|r| r.state_code.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "D"]);

        let top1 = top_n(&d, "m", 1).unwrap();
        assert_eq!(top1, vec![RankedState { state_code: "B".into(), value: 9.0 }]);
    }

    #[test]
    fn test_top_n_rejects_zero() {
        let d = dataset(df!["STATE" => ["A"], "m" => [1.0]].unwrap());
        assert!(matches!(top_n(&d, "m", 0), Err(DashboardError::InvalidArgument(_))));
    }

    #[test]
    fn test_aggregate_score_skips_missing_terms() {
        let d = dataset(
            df![
                "STATE" => ["A", "B", "C"],
                "m1" => [Some(0.0), Some(10.0), Some(5.0)],
                "m2" => [Some(1.0), None, Some(3.0)]
            ]
            .unwrap(),
        );
        let rows = aggregate_score(&d, &["m1", "m2"], &ScoreOptions::default()).unwrap();
        assert_eq!(rows[0].score, Some(0.0));
        // B only has m1, which normalizes to 1.0
        assert_eq!(rows[1].score, Some(1.0));
        assert_eq!(rows[1].contributing, 1);
        assert_eq!(rows[2].score, Some(0.75));
    }

    #[test]
    fn test_aggregate_score_row_without_values() {
        let d = dataset(
            df!["STATE" => ["A", "B", "C"], "m" => [Some(1.0), Some(2.0), None]].unwrap(),
        );
        let rows = aggregate_score(&d, &["m"], &ScoreOptions::default()).unwrap();
        assert_eq!(rows[2].score, None);
        assert_eq!(rows[2].contributing, 0);

        let ranking = top_priority(&d, &["m"], 5, &ScoreOptions::default()).unwrap();
        assert_eq!(ranking.len(), 2);
    }

    #[test]
    fn test_aggregate_score_argument_validation() {
        let d = dataset(df!["STATE" => ["A", "B"], "m" => [1.0, 2.0]].unwrap());
        let empty: [&str; 0] = [];
        assert!(matches!(
            aggregate_score(&d, &empty, &ScoreOptions::default()),
            Err(DashboardError::InvalidArgument(_))
        ));
        assert!(matches!(
            aggregate_score(&d, &["m", "m"], &ScoreOptions::default()),
            Err(DashboardError::InvalidArgument(_))
        ));
        assert!(matches!(
            aggregate_score(&d, &["m"], &ScoreOptions::with_policy(DegeneratePolicy::Constant(2.0))),
            Err(DashboardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_aggregate_score_empty_metric_under_any_policy() {
        let d = dataset(
            df!["STATE" => ["A", "B"], "m" => [1.0, 2.0], "blank" => [None::<f64>, None]].unwrap(),
        );
        for policy in [DegeneratePolicy::Reject, DegeneratePolicy::neutral()] {
            assert!(matches!(
                aggregate_score(&d, &["m", "blank"], &ScoreOptions::with_policy(policy)),
                Err(DashboardError::EmptyMetric(m)) if m == "blank"
            ));
        }
    }

    #[test]
    fn test_aggregate_score_extreme_spread() {
        let d = dataset(
            df!["STATE" => ["A", "B", "C"], "m" => [-1e308, 1e308, 0.0]].unwrap(),
        );
        let rows = aggregate_score(&d, &["m"], &ScoreOptions::default()).unwrap();
        assert_eq!(rows[0].score, Some(0.0));
        assert_eq!(rows[1].score, Some(1.0));
        let middle = rows[2].score.unwrap();
        assert!((middle - 0.5).abs() < 1e-12, "{}", middle);

        let ranking = top_priority(&d, &["m"], 3, &ScoreOptions::default()).unwrap();
        let order: Vec<&str> = ranking.iter().map(|r| r.state_code.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);

        let s = summarize(&d, "m").unwrap();
        assert!(s.mean.is_finite());
        assert_eq!((s.min, s.max), (-1e308, 1e308));
    }

    #[test]
    fn test_summarize_large_values_mean_stays_finite() {
        let d = dataset(df!["STATE" => ["A", "B"], "m" => [1e308, 1e308]].unwrap());
        let s = summarize(&d, "m").unwrap();
        assert_eq!(s.mean, 1e308);
    }

    #[test]
    fn test_infinite_input_scores_stay_in_unit_interval() {
        let frame = df!["STATE" => ["A", "B", "C"], "m" => [1.0, f64::INFINITY, 3.0]].unwrap();
        let d = dataset(frame);
        let rows = aggregate_score(&d, &["m"], &ScoreOptions::default()).unwrap();
        let scores: Vec<Option<f64>> = rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(0.0), None, Some(1.0)]);

        let ranking = top_priority(&d, &["m"], 3, &ScoreOptions::default()).unwrap();
        assert_eq!(
            ranking,
            vec![
                RankedState { state_code: "C".into(), value: 1.0 },
                RankedState { state_code: "A".into(), value: 0.0 },
            ]
        );
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("reject".parse::<DegeneratePolicy>().unwrap(), DegeneratePolicy::Reject);
        assert_eq!(
            "Constant".parse::<DegeneratePolicy>().unwrap(),
            DegeneratePolicy::Constant(0.5)
        );
        assert_eq!(
            "constant:0.25".parse::<DegeneratePolicy>().unwrap(),
            DegeneratePolicy::Constant(0.25)
        );
        assert!("ignore".parse::<DegeneratePolicy>().is_err());
        assert_eq!(DegeneratePolicy::neutral().to_string(), "constant:0.5");
    }

    #[test]
    fn test_cohort_mean() {
        let d = dataset(
            df!["STATE" => ["A", "B", "C"], "m" => [Some(2.0), None, Some(6.0)]].unwrap(),
        );
        assert_eq!(cohort_mean(&d, &["A", "B", "C"], "m").unwrap(), Some(4.0));
        assert_eq!(cohort_mean(&d, &["B"], "m").unwrap(), None);
        assert_eq!(cohort_mean(&d, &["A", "ZZ"], "m").unwrap(), Some(2.0));
        assert!(matches!(
            cohort_mean(&d, &["A"], "other"),
            Err(DashboardError::UnknownMetric(_))
        ));
    }
}
