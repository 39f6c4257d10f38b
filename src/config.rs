use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    pub server: ServerConfig,
}

/// Paths of the three persisted corpora: raw threads as fetched, flat
/// units after flattening, and the enriched append-only output.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub raw_path: PathBuf,
    pub flat_path: PathBuf,
    pub enriched_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// `"file"` reads a platform dump; `"http"` queries a search endpoint.
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_time_window")]
    pub time_window: String,
    #[serde(default = "default_fetch_limit")]
    pub limit: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            path: None,
            url: None,
            query: default_query(),
            sort: default_sort(),
            time_window: default_time_window(),
            limit: default_fetch_limit(),
        }
    }
}

fn default_source_kind() -> String {
    "file".to_string()
}
fn default_query() -> String {
    "review".to_string()
}
fn default_sort() -> String {
    "relevance".to_string()
}
fn default_time_window() -> String {
    "all".to_string()
}
fn default_fetch_limit() -> u32 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Total attempts per classify/extract call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts, no jitter.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_health_attempts")]
    pub health_attempts: u32,
    #[serde(default = "default_health_delay_secs")]
    pub health_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: default_oracle_url(),
            model: default_model(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            health_attempts: default_health_attempts(),
            health_delay_secs: default_health_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_oracle_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_health_attempts() -> u32 {
    5
}
fn default_health_delay_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate source
    match config.source.kind.as_str() {
        "file" => {
            if config.source.path.is_none() {
                anyhow::bail!("source.path must be set when source.kind is 'file'");
            }
        }
        "http" => {
            if config.source.url.is_none() {
                anyhow::bail!("source.url must be set when source.kind is 'http'");
            }
        }
        other => anyhow::bail!("Unknown source kind: '{}'. Must be file or http.", other),
    }

    if config.source.limit < 1 {
        anyhow::bail!("source.limit must be >= 1");
    }

    // Validate oracle
    if config.oracle.max_attempts < 1 {
        anyhow::bail!("oracle.max_attempts must be >= 1");
    }
    if config.oracle.health_attempts < 1 {
        anyhow::bail!("oracle.health_attempts must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("tpulse.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[corpus]
raw_path = "data/raw.json"
flat_path = "data/flat.json"
enriched_path = "data/enriched.json"

[source]
kind = "file"
path = "data/dump.json"

[server]
bind = "127.0.0.1:8000"
"#;

    #[test]
    fn test_minimal_config_gets_oracle_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, MINIMAL);
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.oracle.max_attempts, 3);
        assert_eq!(cfg.oracle.retry_delay_secs, 2);
        assert_eq!(cfg.oracle.health_attempts, 5);
        assert_eq!(cfg.oracle.model, "llama3.2");
        assert_eq!(cfg.source.query, "review");
    }

    #[test]
    fn test_unknown_source_kind_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, &MINIMAL.replace("\"file\"", "\"mongo\""));
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown source kind"));
    }

    #[test]
    fn test_file_source_requires_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, &MINIMAL.replace("path = \"data/dump.json\"\n", ""));
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("source.path"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = format!("{}\n[oracle]\nmax_attempts = 0\n", MINIMAL);
        let path = write_config(&dir, &body);
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
