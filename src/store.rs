//! Artifact Store Client
//!
//! Retrieves pre-rendered map documents and the source dataset from an object
//! store, either over HTTP(S) or from a local mirror of the bucket. One attempt
//! per request; failures are returned to the caller.

use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Object key of the pre-rendered choropleth for a metric
pub fn map_key(metric: &str) -> Result<String> {
    let valid = !metric.is_empty()
        && metric.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DashboardError::InvalidArgument(format!(
            "Metric name '{}' cannot be used in an object key",
            metric
        )));
    }
    Ok(format!("maps/{}_map.html", metric))
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Raw bytes of the object stored under `key`
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Bucket exposed over HTTP(S), e.g. a public or proxied S3 endpoint
#[derive(Clone)]
pub struct HttpArtifactStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpArtifactStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.url_for(key);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DashboardError::Artifact(format!("Request for '{}' failed: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(DashboardError::Artifact(format!(
                "Fetching '{}' returned {}: {}",
                key, status, excerpt
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DashboardError::Artifact(format!("Failed to read '{}': {}", key, e)))?;
        info!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Local directory laid out like the bucket
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(DashboardError::InvalidArgument(format!(
                "Object key '{}' escapes the store root",
                key
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            DashboardError::Artifact(format!("Failed to read {}: {}", path.display(), e))
        })?;
        info!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// HTML document of the choropleth map for `metric`
pub async fn fetch_map_html(store: &dyn ArtifactStore, metric: &str) -> Result<String> {
    let key = map_key(metric)?;
    let bytes = store.fetch(&key).await?;
    String::from_utf8(bytes)
        .map_err(|e| DashboardError::Artifact(format!("Map '{}' is not valid UTF-8: {}", key, e)))
}

/// Fetch and parse the dataset stored under `key`.
///
/// The format follows the key's extension: `.geojson`/`.json` or `.csv`.
pub async fn fetch_dataset(
    store: &dyn ArtifactStore,
    key: &str,
    state_column: &str,
) -> Result<Dataset> {
    let bytes = store.fetch(key).await?;
    parse_dataset(key, &bytes, state_column)
}

/// Parse dataset bytes according to the extension of `name`
pub fn parse_dataset(name: &str, bytes: &[u8], state_column: &str) -> Result<Dataset> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("geojson") | Some("json") => Dataset::from_geojson(bytes, state_column),
        Some("csv") => Dataset::from_csv_bytes(bytes, state_column),
        _ => Err(DashboardError::Dataset(format!(
            "Unsupported dataset format for '{}'",
            name
        ))),
    }
}
