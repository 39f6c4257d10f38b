//! Corpus statistics overview.
//!
//! Provides a quick summary of pipeline progress: thread and unit counts
//! across the three corpora, enrichment coverage, and a sentiment
//! breakdown. Used by `tpulse stats` to give confidence that fetch,
//! flatten, and enrich runs are doing what they should.

use anyhow::Result;

use crate::aggregate::SentimentBucket;
use crate::config::Config;
use crate::models::{TextUnit, UnitKind};
use crate::store::{self, StoreError};

struct CorpusCounts {
    posts: usize,
    comments: usize,
    positive: usize,
    negative: usize,
    neutral: usize,
    others: usize,
}

fn count_units(units: &[TextUnit]) -> CorpusCounts {
    let mut counts = CorpusCounts {
        posts: 0,
        comments: 0,
        positive: 0,
        negative: 0,
        neutral: 0,
        others: 0,
    };

    for unit in units {
        match unit.kind() {
            UnitKind::Post => counts.posts += 1,
            UnitKind::Comment => counts.comments += 1,
        }
        if let Some(sentiment) = &unit.sentiment {
            match SentimentBucket::classify(sentiment) {
                SentimentBucket::Positive => counts.positive += 1,
                SentimentBucket::Negative => counts.negative += 1,
                SentimentBucket::Neutral => counts.neutral += 1,
                SentimentBucket::Other => counts.others += 1,
            }
        }
    }

    counts
}

fn load_optional(path: &std::path::Path) -> Result<Option<Vec<TextUnit>>> {
    match store::load_units(path) {
        Ok(units) => Ok(Some(units)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Run the stats command: read the corpora and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let raw = store::load_threads_or_empty(&config.corpus.raw_path);
    let flat = load_optional(&config.corpus.flat_path)?;
    let enriched = load_optional(&config.corpus.enriched_path)?;

    println!("ThreadPulse — Corpus Stats");
    println!("==========================");
    println!();
    println!("  Raw:       {}", config.corpus.raw_path.display());
    println!("  Threads:   {}", raw.len());

    println!();
    println!("  Flat:      {}", config.corpus.flat_path.display());
    match &flat {
        Some(units) => {
            let counts = count_units(units);
            println!("  Units:     {}", units.len());
            println!("  Posts:     {}", counts.posts);
            println!("  Comments:  {}", counts.comments);
        }
        None => println!("  Units:     (not flattened yet)"),
    }

    println!();
    println!("  Enriched:  {}", config.corpus.enriched_path.display());
    match &enriched {
        Some(units) => {
            let counts = count_units(units);
            let flat_total = flat.as_ref().map(|f| f.len()).unwrap_or(0);
            println!(
                "  Units:     {} / {} ({}%)",
                units.len(),
                flat_total,
                if flat_total > 0 {
                    units.len() * 100 / flat_total
                } else {
                    0
                }
            );
            println!("  Positive:  {}", counts.positive);
            println!("  Negative:  {}", counts.negative);
            println!("  Neutral:   {}", counts.neutral);
            println!("  Others:    {}", counts.others);
        }
        None => println!("  Units:     (not enriched yet)"),
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitPayload;

    fn unit(id: &str, sentiment: Option<&str>, post: bool) -> TextUnit {
        TextUnit {
            id: id.to_string(),
            created_at: 1704100000,
            score: 10,
            payload: if post {
                UnitPayload::Post {
                    title: "t".to_string(),
                    url: "u".to_string(),
                }
            } else {
                UnitPayload::Comment {
                    body: "b".to_string(),
                    parent_id: "p".to_string(),
                    parent_text: "t".to_string(),
                }
            },
            sentiment: sentiment.map(|s| s.to_string()),
            keywords: None,
        }
    }

    #[test]
    fn test_count_units_by_kind_and_sentiment() {
        let units = vec![
            unit("a", Some("positive"), true),
            unit("b", Some("positive"), false),
            unit("c", Some("negative"), false),
            unit("d", Some("mixed"), false),
            unit("e", None, false),
        ];

        let counts = count_units(&units);
        assert_eq!(counts.posts, 1);
        assert_eq!(counts.comments, 4);
        assert_eq!(counts.positive, 2);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.neutral, 0);
        assert_eq!(counts.others, 1);
    }
}
