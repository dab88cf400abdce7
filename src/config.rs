//! Dashboard configuration, read from the environment (and `.env` via dotenv).

use crate::aggregator::DegeneratePolicy;
use crate::dataset::DEFAULT_STATE_COLUMN;
use crate::error::{DashboardError, Result};
use crate::store::{ArtifactStore, HttpArtifactStore, LocalArtifactStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_DATASET_KEY: &str = "data/merged_map_extended.geojson";
pub const DEFAULT_RANKING_TOP_N: usize = 10;
pub const DEFAULT_PRIORITY_TOP_N: usize = 5;

/// Where artifacts are read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArtifactSource {
    Http {
        base_url: String,
        #[serde(skip_serializing)]
        token: Option<String>,
    },
    Local {
        root: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub source: Option<ArtifactSource>,
    pub dataset_key: String,
    pub state_column: String,
    pub ranking_top_n: usize,
    pub priority_top_n: usize,
    pub degenerate: DegeneratePolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: None,
            dataset_key: DEFAULT_DATASET_KEY.to_string(),
            state_column: DEFAULT_STATE_COLUMN.to_string(),
            ranking_top_n: DEFAULT_RANKING_TOP_N,
            priority_top_n: DEFAULT_PRIORITY_TOP_N,
            degenerate: DegeneratePolicy::Reject,
        }
    }
}

impl DashboardConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let source = match (get("ARTIFACT_BASE_URL"), get("ARTIFACT_DIR")) {
            (Some(base_url), _) => Some(ArtifactSource::Http {
                base_url,
                token: get("ARTIFACT_TOKEN"),
            }),
            (None, Some(root)) => Some(ArtifactSource::Local { root: root.into() }),
            (None, None) => None,
        };

        let parse_n = |key: &str, default: usize| -> Result<usize> {
            match get(key) {
                None => Ok(default),
                Some(raw) => match raw.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(DashboardError::Config(format!(
                        "{} must be a positive integer, got '{}'",
                        key, raw
                    ))),
                },
            }
        };

        let degenerate = match get("DEGENERATE_POLICY") {
            None => defaults.degenerate,
            Some(raw) => raw
                .parse::<DegeneratePolicy>()
                .map_err(|e| DashboardError::Config(format!("DEGENERATE_POLICY: {}", e)))?,
        };

        Ok(Self {
            source,
            dataset_key: get("DATASET_KEY").unwrap_or(defaults.dataset_key),
            state_column: get("STATE_COLUMN").unwrap_or(defaults.state_column),
            ranking_top_n: parse_n("RANKING_TOP_N", defaults.ranking_top_n)?,
            priority_top_n: parse_n("PRIORITY_TOP_N", defaults.priority_top_n)?,
            degenerate,
        })
    }

    /// Instantiate the configured artifact store
    pub fn build_store(&self) -> Result<Box<dyn ArtifactStore>> {
        match &self.source {
            Some(ArtifactSource::Http { base_url, token }) => {
                Ok(Box::new(HttpArtifactStore::new(base_url.clone(), token.clone())))
            }
            Some(ArtifactSource::Local { root }) => Ok(Box::new(LocalArtifactStore::new(root.clone()))),
            None => Err(DashboardError::Config(
                "Set ARTIFACT_BASE_URL or ARTIFACT_DIR to locate artifacts".to_string(),
            )),
        }
    }
}
