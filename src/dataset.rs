//! Tabular Dataset
//!
//! An immutable table of per-state rows backed by a polars `DataFrame`.
//! One string column identifies the state; every numeric column is a metric
//! stored as nullable `Float64`.

use crate::error::{DashboardError, Result};
use itertools::Itertools;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default name of the state identifier column in the source artifacts
pub const DEFAULT_STATE_COLUMN: &str = "STATE";

/// Rows sampled when inferring CSV column types
pub const CSV_INFER_SCHEMA_LENGTH: usize = 1000;

pub(crate) fn polars_err(e: PolarsError) -> DashboardError {
    DashboardError::Polars(e.to_string())
}

/// Session-scoped, read-only table of per-state metric values
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    state_column: String,
    state_codes: Vec<String>,
    metrics: Vec<String>,
}

impl Dataset {
    /// Build a dataset from an existing frame.
    ///
    /// The state column must be present with a unique, non-empty code on every
    /// row. Numeric columns become metrics; any other column such as names or
    /// geometry is dropped. NaN and infinite values are stored as missing.
    pub fn from_frame(frame: DataFrame, state_column: &str) -> Result<Self> {
        let states = frame.column(state_column).map_err(|_| {
            DashboardError::Dataset(format!("State column '{}' not found", state_column))
        })?;
        let states = states.cast(&DataType::String).map_err(polars_err)?;

        let mut state_codes = Vec::with_capacity(states.len());
        for (idx, code) in states.str().map_err(polars_err)?.into_iter().enumerate() {
            match code.map(str::trim) {
                Some(code) if !code.is_empty() => state_codes.push(code.to_string()),
                _ => {
                    return Err(DashboardError::Dataset(format!(
                        "Row {} has no value in state column '{}'",
                        idx, state_column
                    )))
                }
            }
        }

        let duplicates: Vec<&String> = state_codes.iter().duplicates().collect();
        if !duplicates.is_empty() {
            return Err(DashboardError::Dataset(format!(
                "Duplicate state codes: {}",
                duplicates.iter().join(", ")
            )));
        }

        let mut columns = vec![Series::new(state_column, state_codes.clone())];
        let mut metrics = Vec::new();
        for series in frame.get_columns() {
            let name = series.name();
            if name == state_column {
                continue;
            }
            let dtype = series.dtype();
            if !(dtype.is_numeric() || matches!(dtype, DataType::Null)) {
                debug!("Skipping non-numeric column '{}' ({})", name, dtype);
                continue;
            }
            let cast = series.cast(&DataType::Float64).map_err(polars_err)?;
            let raw = cast.f64().map_err(polars_err)?;
            let values: Vec<Option<f64>> = raw
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            let non_finite = raw.len() - raw.null_count() - values.iter().flatten().count();
            if non_finite > 0 {
                warn!("Column '{}': {} non-finite values treated as missing", name, non_finite);
            }
            columns.push(Series::new(name, values));
            metrics.push(name.to_string());
        }

        let frame = DataFrame::new(columns).map_err(polars_err)?;
        info!(
            "Loaded dataset: {} states, {} metric columns",
            frame.height(),
            metrics.len()
        );

        Ok(Self {
            frame,
            state_column: state_column.to_string(),
            state_codes,
            metrics,
        })
    }

    /// Load a CSV file from disk
    pub fn from_csv_path(path: impl AsRef<Path>, state_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            DashboardError::Dataset(format!("Failed to read CSV {}: {}", path.display(), e))
        })?;
        Self::from_csv_bytes(&bytes, state_column)
    }

    /// Parse CSV content with a header row.
    ///
    /// Local files and fetched artifacts both go through here so column types
    /// are inferred the same way.
    pub fn from_csv_bytes(bytes: &[u8], state_column: &str) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(CSV_INFER_SCHEMA_LENGTH))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| DashboardError::Dataset(format!("Failed to parse CSV: {}", e)))?;
        Self::from_frame(frame, state_column)
    }

    /// Parse a GeoJSON `FeatureCollection`, one row per feature.
    ///
    /// Feature geometry is ignored. A property becomes a metric column when every
    /// non-null occurrence of it is a JSON number.
    pub fn from_geojson(bytes: &[u8], state_column: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_slice(bytes)?;
        if collection.kind.as_deref().is_some_and(|k| k != "FeatureCollection") {
            return Err(DashboardError::Dataset(format!(
                "Expected a FeatureCollection, found {}",
                collection.kind.unwrap_or_default()
            )));
        }

        let rows: Vec<Map<String, Value>> = collection
            .features
            .into_iter()
            .map(|f| f.properties.unwrap_or_default())
            .collect();

        let mut states = Vec::with_capacity(rows.len());
        for (idx, props) in rows.iter().enumerate() {
            let code = match props.get(state_column) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match code {
                Some(code) => states.push(code),
                None => {
                    return Err(DashboardError::Dataset(format!(
                        "Feature {} has no '{}' property",
                        idx, state_column
                    )))
                }
            }
        }

        // Column order follows first appearance across features.
        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut non_numeric = HashSet::new();
        for props in &rows {
            for (key, value) in props {
                if key == state_column {
                    continue;
                }
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
                if !matches!(value, Value::Number(_) | Value::Null) {
                    non_numeric.insert(key.clone());
                }
            }
        }

        let mut columns = vec![Series::new(state_column, states)];
        for name in names.iter().filter(|n| !non_numeric.contains(*n)) {
            let values: Vec<Option<f64>> = rows
                .iter()
                .map(|props| props.get(name).and_then(Value::as_f64))
                .collect();
            columns.push(Series::new(name, values));
        }

        let frame = DataFrame::new(columns).map_err(polars_err)?;
        Self::from_frame(frame, state_column)
    }

    pub fn len(&self) -> usize {
        self.state_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_codes.is_empty()
    }

    pub fn state_column(&self) -> &str {
        &self.state_column
    }

    /// State codes in original row order
    pub fn state_codes(&self) -> &[String] {
        &self.state_codes
    }

    /// Metric column names in original column order
    pub fn metric_names(&self) -> &[String] {
        &self.metrics
    }

    pub fn has_metric(&self, metric: &str) -> bool {
        self.metrics.iter().any(|m| m == metric)
    }

    /// Row index of a state code
    pub fn position(&self, state_code: &str) -> Option<usize> {
        self.state_codes.iter().position(|s| s == state_code)
    }

    /// Values of one metric in row order; `None` marks a missing value.
    pub fn metric_values(&self, metric: &str) -> Result<Vec<Option<f64>>> {
        if !self.has_metric(metric) {
            return Err(DashboardError::UnknownMetric(metric.to_string()));
        }
        let series = self.frame.column(metric).map_err(polars_err)?;
        Ok(series.f64().map_err(polars_err)?.into_iter().collect())
    }

    /// Single value lookup; fails only when the metric is not a column.
    pub fn value(&self, state_code: &str, metric: &str) -> Result<Option<f64>> {
        let values = self.metric_values(metric)?;
        Ok(self.position(state_code).and_then(|idx| values[idx]))
    }

    /// Read-only view of the underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}
