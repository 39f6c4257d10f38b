//! Enrichment driver.
//!
//! Feeds flattened units through the oracle client strictly in order, one
//! external call in flight at a time. Ordering is needed only for stable
//! progress reporting; sequencing is what respects the oracle's rate
//! limits. The batch is all-or-nothing: a permanent failure discards every
//! unit enriched so far in this run and surfaces the error, so partial
//! enrichment is never persisted. Prior successful runs are untouched —
//! the enriched corpus is append-only and existing entries are never
//! rewritten.

use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::models::{TextUnit, UnitPayload};
use crate::oracle::{ChatTransport, OllamaTransport, OracleClient};
use crate::retry::ExternalServiceError;
use crate::store;

/// Enrich every unit in input order. Returns the full batch on success,
/// or the permanent failure that aborted the run.
pub async fn enrich_units<T: ChatTransport>(
    client: &OracleClient<T>,
    mut units: Vec<TextUnit>,
) -> Result<Vec<TextUnit>, ExternalServiceError> {
    let total = units.len();

    for (i, unit) in units.iter_mut().enumerate() {
        info!(unit_id = %unit.id, current = i + 1, total, "enriching unit");

        let context = match &unit.payload {
            UnitPayload::Comment { parent_text, .. } => Some(parent_text.clone()),
            UnitPayload::Post { .. } => None,
        };

        let sentiment = client
            .classify_sentiment(unit.text(), context.as_deref())
            .await?;
        let keywords = client.extract_keywords(&sentiment, unit.text()).await?;

        unit.sentiment = Some(sentiment);
        unit.keywords = Some(keywords);
    }

    Ok(units)
}

/// CLI entry point for `tpulse enrich`.
///
/// Loads the flat corpus, drops units whose ids are already present in the
/// enriched corpus (incremental runs re-enrich nothing), waits for the
/// oracle, enriches the remainder, and appends the results.
pub async fn run_enrich(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    let flat = store::load_units(&config.corpus.flat_path)?;

    let enriched = match store::load_units(&config.corpus.enriched_path) {
        Ok(units) => units,
        Err(store::StoreError::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let enriched_ids: HashSet<&str> = enriched.iter().map(|u| u.id.as_str()).collect();

    let mut pending: Vec<TextUnit> = flat
        .into_iter()
        .filter(|u| !enriched_ids.contains(u.id.as_str()))
        .collect();
    if let Some(lim) = limit {
        pending.truncate(lim);
    }

    if dry_run {
        println!("enrich (dry-run)");
        println!("  already enriched: {}", enriched.len());
        println!("  pending units: {}", pending.len());
        return Ok(());
    }

    if pending.is_empty() {
        println!("enrich");
        println!("  pending units: 0");
        println!("ok");
        return Ok(());
    }

    let transport = OllamaTransport::new(&config.oracle)?;
    let client = OracleClient::new(transport, &config.oracle);
    client.wait_ready().await?;

    let pending_count = pending.len();
    let fresh = enrich_units(&client, pending).await?;

    let mut combined = enriched;
    combined.extend(fresh);
    store::save_units(&config.corpus.enriched_path, &combined)?;

    println!("enrich");
    println!("  enriched units: {}", pending_count);
    println!("  corpus total: {}", combined.len());
    println!("  written: {}", config.corpus.enriched_path.display());
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Answers sentiment and keyword prompts from their user-message
    /// shapes; records every user message it sees.
    struct ScriptedTransport {
        sentiment: String,
        fail_from_call: Option<u32>,
        calls: AtomicU32,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(sentiment: &str) -> Self {
            Self {
                sentiment: sentiment.to_string(),
                fail_from_call: None,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn chat(&self, _system: &str, user: &str, _json_mode: bool) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(from) = self.fail_from_call {
                if n >= from {
                    bail!("oracle fell over");
                }
            }
            self.seen.lock().unwrap().push(user.to_string());

            if user.starts_with("Sentiment: ") {
                Ok(r#"{"keywords": ["alpha", "beta"]}"#.to_string())
            } else {
                Ok(format!(r#"{{"sentiment": "{}"}}"#, self.sentiment))
            }
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> OracleConfig {
        OracleConfig {
            retry_delay_secs: 0,
            health_delay_secs: 0,
            ..OracleConfig::default()
        }
    }

    fn post(id: &str) -> TextUnit {
        TextUnit {
            id: id.to_string(),
            created_at: 1704100000,
            score: 10,
            payload: UnitPayload::Post {
                title: format!("title {}", id),
                url: "u".to_string(),
            },
            sentiment: None,
            keywords: None,
        }
    }

    fn comment(id: &str, parent_text: &str) -> TextUnit {
        TextUnit {
            id: id.to_string(),
            created_at: 1704100500,
            score: 15,
            payload: UnitPayload::Comment {
                body: format!("body {}", id),
                parent_id: "p".to_string(),
                parent_text: parent_text.to_string(),
            },
            sentiment: None,
            keywords: None,
        }
    }

    #[tokio::test]
    async fn test_all_units_enriched_in_order() {
        let client = OracleClient::new(ScriptedTransport::new("positive"), &fast_config());
        let units = vec![post("p1"), comment("c1", "title p1")];

        let enriched = enrich_units(&client, units).await.unwrap();
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].id, "p1");
        assert_eq!(enriched[1].id, "c1");
        for unit in &enriched {
            assert_eq!(unit.sentiment.as_deref(), Some("positive"));
            assert_eq!(
                unit.keywords.as_deref(),
                Some(&["alpha".to_string(), "beta".to_string()][..])
            );
        }
    }

    #[tokio::test]
    async fn test_parent_text_sent_only_for_comments() {
        let client = OracleClient::new(ScriptedTransport::new("neutral"), &fast_config());
        let units = vec![post("p1"), comment("c1", "title p1")];

        enrich_units(&client, units).await.unwrap();

        let seen = client.transport().seen.lock().unwrap();
        // post sentiment, post keywords, comment sentiment, comment keywords
        assert_eq!(seen.len(), 4);
        assert!(!seen[0].contains("Parent Body"));
        assert!(seen[2].contains("Parent Body: title p1"));
    }

    #[tokio::test]
    async fn test_permanent_failure_aborts_whole_run() {
        let mut transport = ScriptedTransport::new("positive");
        // First unit enriches fine (2 calls); everything after fails.
        transport.fail_from_call = Some(3);
        let client = OracleClient::new(transport, &fast_config());

        let units = vec![post("p1"), post("p2")];
        let err = enrich_units(&client, units).await.unwrap_err();
        assert_eq!(err.attempts, 3);
    }
}
