//! Thread-fetch boundary.
//!
//! The platform client is an external collaborator; this module specifies
//! it only at its seam. [`ThreadSource::search`] delivers raw, unfiltered
//! threads — score/tombstone filtering belongs to the flattener, and
//! duplicate suppression to the ingestion guard.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::models::RawThread;

#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        sort: &str,
        time_window: &str,
        limit: u32,
    ) -> Result<Vec<RawThread>>;
}

/// Reads a platform dump file: a JSON array of threads exported by the
/// platform tooling. The dump is assumed to already reflect the query;
/// only `limit` is applied here.
pub struct FileThreadSource {
    path: PathBuf,
}

impl FileThreadSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ThreadSource for FileThreadSource {
    async fn search(
        &self,
        _query: &str,
        _sort: &str,
        _time_window: &str,
        limit: u32,
    ) -> Result<Vec<RawThread>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read thread dump: {}", self.path.display()))?;
        let mut threads: Vec<RawThread> = serde_json::from_str(&content)
            .with_context(|| format!("Thread dump is not valid JSON: {}", self.path.display()))?;
        threads.truncate(limit as usize);
        Ok(threads)
    }
}

/// Queries an HTTP search endpoint that answers with a JSON array of
/// threads (nested comments included).
pub struct HttpThreadSource {
    client: reqwest::Client,
    url: String,
}

impl HttpThreadSource {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ThreadSource for HttpThreadSource {
    async fn search(
        &self,
        query: &str,
        sort: &str,
        time_window: &str,
        limit: u32,
    ) -> Result<Vec<RawThread>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("q", query),
                ("sort", sort),
                ("t", time_window),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Thread search request failed: {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Thread search returned {}: {}", status, body);
        }

        let threads: Vec<RawThread> = resp
            .json()
            .await
            .context("Thread search response is not a JSON thread array")?;
        Ok(threads)
    }
}

/// Build the configured source implementation.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn ThreadSource>> {
    match config.kind.as_str() {
        "file" => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source.path required for file source"))?;
            Ok(Box::new(FileThreadSource::new(path)))
        }
        "http" => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source.url required for http source"))?;
            Ok(Box::new(HttpThreadSource::new(url)?))
        }
        other => bail!("Unknown source kind: '{}'. Must be file or http.", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_source_reads_dump_and_applies_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "a", "title": "A", "created_UTC": 1, "url": "u", "score": 1, "comments": []},
                {"id": "b", "title": "B", "created_UTC": 2, "url": "u", "score": 2, "comments": []},
                {"id": "c", "title": "C", "created_UTC": 3, "url": "u", "score": 3, "comments": []}
            ]"#,
        )
        .unwrap();

        let source = FileThreadSource::new(path);
        let threads = source.search("review", "relevance", "all", 2).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].id, "a");
    }

    #[tokio::test]
    async fn test_file_source_missing_dump_errors() {
        let source = FileThreadSource::new(PathBuf::from("/nonexistent/dump.json"));
        let err = source
            .search("review", "relevance", "all", 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read thread dump"));
    }
}
