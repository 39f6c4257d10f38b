//! Thread ingestion.
//!
//! Coordinates the fetch flow: search the configured source, drop threads
//! already present in the raw corpus, append the rest. The raw corpus is
//! append-only; a thread fetched once is never fetched again, even if its
//! score or comments changed upstream.

use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::models::RawThread;
use crate::source;
use crate::store;

/// Duplicate-suppression guard: keeps only candidates whose ids are absent
/// from `existing_ids`, preserving candidate order.
pub fn select_new(existing_ids: &HashSet<String>, candidates: Vec<RawThread>) -> Vec<RawThread> {
    candidates
        .into_iter()
        .filter(|thread| {
            if existing_ids.contains(&thread.id) {
                info!(thread_id = %thread.id, "skipping already-ingested thread");
                false
            } else {
                true
            }
        })
        .collect()
}

/// CLI entry point for `tpulse fetch`.
pub async fn run_fetch(config: &Config, limit: Option<u32>, dry_run: bool) -> Result<()> {
    let src = source::from_config(&config.source)?;
    let limit = limit.unwrap_or(config.source.limit);

    let fetched = src
        .search(
            &config.source.query,
            &config.source.sort,
            &config.source.time_window,
            limit,
        )
        .await?;
    let fetched_count = fetched.len();

    let existing = store::load_threads_or_empty(&config.corpus.raw_path);
    let existing_ids: HashSet<String> = existing.iter().map(|t| t.id.clone()).collect();

    let fresh = select_new(&existing_ids, fetched);
    let fresh_count = fresh.len();

    if dry_run {
        println!("fetch (dry-run)");
        println!("  fetched: {}", fetched_count);
        println!("  new: {}", fresh_count);
        println!("  skipped: {}", fetched_count - fresh_count);
        return Ok(());
    }

    let mut combined = existing;
    combined.extend(fresh);
    store::save_threads(&config.corpus.raw_path, &combined)?;

    println!("fetch");
    println!("  fetched: {}", fetched_count);
    println!("  new: {}", fresh_count);
    println!("  skipped: {}", fetched_count - fresh_count);
    println!("  corpus total: {}", combined.len());
    println!("  written: {}", config.corpus.raw_path.display());
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str) -> RawThread {
        RawThread {
            id: id.to_string(),
            title: format!("title {}", id),
            created_at: 1704100000,
            url: "u".to_string(),
            score: 100,
            comments: vec![],
        }
    }

    #[test]
    fn test_select_new_drops_known_ids() {
        let existing: HashSet<String> = ["a".to_string(), "c".to_string()].into();
        let candidates = vec![thread("a"), thread("b"), thread("c"), thread("d")];

        let fresh = select_new(&existing, candidates);
        let ids: Vec<&str> = fresh.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_select_new_empty_corpus_keeps_everything() {
        let existing = HashSet::new();
        let fresh = select_new(&existing, vec![thread("a"), thread("b")]);
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_select_new_all_duplicates_yields_empty() {
        let existing: HashSet<String> = ["a".to_string(), "b".to_string()].into();
        let fresh = select_new(&existing, vec![thread("a"), thread("b")]);
        assert!(fresh.is_empty());
    }
}
