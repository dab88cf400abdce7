use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Metric has no defined values: {0}")]
    EmptyMetric(String),

    #[error("Metric has zero variance and cannot be normalized: {0}")]
    DegenerateMetric(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl DashboardError {
    /// Errors that describe the caller's request rather than the data.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DashboardError::UnknownMetric(_) | DashboardError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
