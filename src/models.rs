//! Core data models used throughout ThreadPulse.
//!
//! These types represent the raw threads fetched from the platform and the
//! flat text units that flow through the enrichment and serving pipeline.

use serde::{Deserialize, Serialize};

/// A root post plus its nested comment tree, as delivered by the
/// thread-fetch boundary. Immutable once fetched.
///
/// The `created_UTC` field name matches the platform dump format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawThread {
    pub id: String,
    pub title: String,
    #[serde(rename = "created_UTC")]
    pub created_at: i64,
    pub url: String,
    pub score: i64,
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

/// A single comment node. `replies` nests arbitrarily deep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: String,
    pub body: String,
    #[serde(rename = "created_UTC")]
    pub created_at: i64,
    pub score: i64,
    pub parent_id: String,
    #[serde(default)]
    pub link_id: String,
    #[serde(default)]
    pub replies: Vec<RawComment>,
}

/// The atomic, independently classifiable item carried through enrichment
/// and aggregation. Produced by the flattener, mutated once by the
/// enrichment driver (sentiment + keywords attached), then frozen.
///
/// `sentiment` is kept as a free string: the oracle may return a value
/// outside {positive, negative, neutral}, which the aggregation engine
/// buckets as "other" rather than rejecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    #[serde(rename = "created_UTC")]
    pub created_at: i64,
    pub score: i64,
    #[serde(flatten)]
    pub payload: UnitPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Kind-specific fields of a [`TextUnit`]. A post contributes its title,
/// a comment its body plus the resolved text of its immediate parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnitPayload {
    Post {
        title: String,
        url: String,
    },
    Comment {
        body: String,
        parent_id: String,
        parent_text: String,
    },
}

/// Discriminant of [`UnitPayload`], for callers that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Post,
    Comment,
}

impl TextUnit {
    pub fn kind(&self) -> UnitKind {
        match self.payload {
            UnitPayload::Post { .. } => UnitKind::Post,
            UnitPayload::Comment { .. } => UnitKind::Comment,
        }
    }

    pub fn is_post(&self) -> bool {
        self.kind() == UnitKind::Post
    }

    /// The classifiable text: title for posts, body for comments.
    pub fn text(&self) -> &str {
        match &self.payload {
            UnitPayload::Post { title, .. } => title,
            UnitPayload::Comment { body, .. } => body,
        }
    }

    /// Resolved parent text, present only for comment units.
    pub fn parent_text(&self) -> Option<&str> {
        match &self.payload {
            UnitPayload::Post { .. } => None,
            UnitPayload::Comment { parent_text, .. } => Some(parent_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_kind_tag_round_trip() {
        let unit = TextUnit {
            id: "p1".to_string(),
            created_at: 1704100000,
            score: 42,
            payload: UnitPayload::Post {
                title: "A title".to_string(),
                url: "https://example.com/p1".to_string(),
            },
            sentiment: None,
            keywords: None,
        };

        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["kind"], "post");
        assert_eq!(json["title"], "A title");
        // Unenriched fields are omitted from the persisted form.
        assert!(json.get("sentiment").is_none());
        assert!(json.get("keywords").is_none());

        let back: TextUnit = serde_json::from_value(json).unwrap();
        assert!(back.is_post());
        assert_eq!(back.text(), "A title");
    }

    #[test]
    fn test_comment_unit_carries_parent_text() {
        let json = serde_json::json!({
            "id": "c1",
            "kind": "comment",
            "body": "agree completely",
            "created_UTC": 1704100500,
            "score": 15,
            "parent_id": "p1",
            "parent_text": "A title",
            "sentiment": "positive",
            "keywords": ["agree"]
        });

        let unit: TextUnit = serde_json::from_value(json).unwrap();
        assert_eq!(unit.kind(), UnitKind::Comment);
        assert_eq!(unit.parent_text(), Some("A title"));
        assert_eq!(unit.sentiment.as_deref(), Some("positive"));
    }
}
