//! Aggregation engine over the enriched corpus.
//!
//! Three read-only query shapes, all pure functions of the corpus and the
//! query parameters: time-bucketed sentiment counts, keyword frequency
//! rankings filtered by sentiment, and posts ranked by score. Used by both
//! the HTTP handlers in [`crate::server`] and the `tpulse stats` command.

use std::collections::{BTreeMap, HashMap};

use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;
use thiserror::Error;

use crate::models::TextUnit;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical sentiment buckets. Anything the oracle returned outside the
/// three canonical labels lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentBucket {
    Positive,
    Negative,
    Neutral,
    Other,
}

impl SentimentBucket {
    pub fn classify(sentiment: &str) -> Self {
        match sentiment {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "neutral" => Self::Neutral,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineBucket {
    pub date: String,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub others: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverallCounts {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub others: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineResponse {
    pub timeline: Vec<TimelineBucket>,
    pub overall: OverallCounts,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordResponse {
    pub sentiment: String,
    pub keywords: Vec<KeywordEntry>,
    pub total_keywords: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopPostsResponse {
    pub posts: Vec<TextUnit>,
    pub total_posts: usize,
}

/// Query parameter that failed to parse. Never retried, never defaulted.
#[derive(Debug, Error)]
#[error("invalid time bound '{value}': expected a unix timestamp or a date matching {DATE_FORMAT}")]
pub struct InvalidTimeBound {
    pub value: String,
}

/// Parse a time bound accepted in either form: a raw epoch timestamp
/// (canonical) or an ISO calendar date (compatibility shim). Date-form end
/// bounds are normalized to 23:59:59 local time so the range stays
/// inclusive of the whole day.
pub fn parse_time_bound(raw: &str, end_of_day: bool) -> Result<i64, InvalidTimeBound> {
    if let Ok(ts) = raw.parse::<i64>() {
        return Ok(ts);
    }

    let invalid = || InvalidTimeBound {
        value: raw.to_string(),
    };

    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59).unwrap()
    } else {
        date.and_hms_opt(0, 0, 0).unwrap()
    };
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(invalid)
}

/// Time-bucketed sentiment counts plus overall totals.
///
/// Bounds are inclusive epoch seconds; `None` is unbounded. Units are
/// grouped by local calendar date; buckets come back sorted ascending by
/// date string.
pub fn sentiment_timeline(
    units: &[TextUnit],
    start: Option<i64>,
    end: Option<i64>,
) -> TimelineResponse {
    let mut days: BTreeMap<String, [u64; 4]> = BTreeMap::new();
    let mut overall = [0u64; 4];

    for unit in units {
        if start.is_some_and(|s| unit.created_at < s) || end.is_some_and(|e| unit.created_at > e) {
            continue;
        }

        let date = local_date_string(unit.created_at);
        let bucket = SentimentBucket::classify(unit.sentiment.as_deref().unwrap_or(""));
        let idx = bucket_index(bucket);

        days.entry(date).or_insert([0; 4])[idx] += 1;
        overall[idx] += 1;
    }

    let timeline = days
        .into_iter()
        .map(|(date, counts)| TimelineBucket {
            date,
            positive: counts[0],
            negative: counts[1],
            neutral: counts[2],
            others: counts[3],
        })
        .collect();

    TimelineResponse {
        timeline,
        overall: OverallCounts {
            positive: overall[0],
            negative: overall[1],
            neutral: overall[2],
            others: overall[3],
            total: overall.iter().sum(),
        },
    }
}

/// Keyword frequencies across units whose sentiment matches `sentiment`
/// exactly (case-sensitive). Sorted descending by frequency; ties keep
/// first-encountered order.
pub fn keyword_frequencies(units: &[TextUnit], sentiment: &str) -> KeywordResponse {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for unit in units {
        if unit.sentiment.as_deref() != Some(sentiment) {
            continue;
        }
        if let Some(keywords) = &unit.keywords {
            for keyword in keywords {
                let count = counts.entry(keyword.as_str()).or_insert(0);
                if *count == 0 {
                    order.push(keyword.as_str());
                }
                *count += 1;
            }
        }
    }

    let mut keywords: Vec<KeywordEntry> = order
        .into_iter()
        .map(|k| KeywordEntry {
            keyword: k.to_string(),
            frequency: counts[k],
        })
        .collect();
    // sort_by is stable, so equal frequencies preserve first-seen order
    keywords.sort_by(|a, b| b.frequency.cmp(&a.frequency));

    KeywordResponse {
        sentiment: sentiment.to_string(),
        total_keywords: keywords.len(),
        keywords,
    }
}

/// All POST units sorted descending by score; ties keep corpus order.
pub fn top_posts(units: &[TextUnit]) -> TopPostsResponse {
    let mut posts: Vec<TextUnit> = units.iter().filter(|u| u.is_post()).cloned().collect();
    posts.sort_by(|a, b| b.score.cmp(&a.score));

    TopPostsResponse {
        total_posts: posts.len(),
        posts,
    }
}

fn bucket_index(bucket: SentimentBucket) -> usize {
    match bucket {
        SentimentBucket::Positive => 0,
        SentimentBucket::Negative => 1,
        SentimentBucket::Neutral => 2,
        SentimentBucket::Other => 3,
    }
}

fn local_date_string(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format(DATE_FORMAT).to_string(),
        _ => ts.to_string(),
    }
}
