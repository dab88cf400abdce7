pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod report;
pub mod store;

pub use aggregator::{
    aggregate_score, cohort_mean, summarize, top_n, top_priority, DegeneratePolicy,
    MetricSummary, RankedState, Ranking, ScoreOptions, ScoredRow,
};
pub use catalog::MetricCatalog;
pub use config::DashboardConfig;
pub use dataset::Dataset;
pub use error::{DashboardError, Result};
pub use report::{build_report, DashboardReport, ReportSettings};
pub use store::{ArtifactStore, HttpArtifactStore, LocalArtifactStore};
