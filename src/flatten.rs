//! Comment-tree flattener.
//!
//! Converts nested threads into a flat, order-preserving sequence of
//! [`TextUnit`]s, each comment annotated with the resolved text of its
//! immediate parent. Pure data transformation: no I/O, deterministic for
//! a fixed input.
//!
//! Traversal is depth-first pre-order over an explicit stack, so reply
//! chains of unbounded depth cannot exhaust the call stack. Parent
//! resolution uses an id → text map that is mutated in traversal order:
//! entries are added only for qualifying nodes, read before write for any
//! node, and never deleted. Because a node's parent is an ancestor in the
//! same tree, it is always visited (and, if it qualified, registered)
//! strictly before the node itself.

use std::collections::HashMap;

use anyhow::Result;

use crate::config::Config;
use crate::models::{RawComment, RawThread, TextUnit, UnitPayload};
use crate::store;

/// A comment is emitted only when its score is strictly above this.
pub const SCORE_THRESHOLD: i64 = 10;

/// Body text the platform substitutes for removed comments.
pub const TOMBSTONE: &str = "[deleted]";

/// Sentinel parent text used when the parent was filtered out or never seen.
pub const PARENT_UNAVAILABLE: &str = "Parent content not available";

/// Flatten a batch of threads into text units.
///
/// Every thread contributes exactly one post unit, unconditionally. Each
/// comment contributes one unit iff it qualifies (see [`SCORE_THRESHOLD`]
/// and [`TOMBSTONE`]); non-qualifying comments are neither emitted nor
/// registered as resolvable parents, but their subtrees are still walked,
/// so a qualifying reply below a filtered ancestor is kept and falls back
/// to [`PARENT_UNAVAILABLE`] when its own parent did not qualify.
pub fn flatten(threads: &[RawThread]) -> Vec<TextUnit> {
    let mut units = Vec::new();
    let mut parent_texts: HashMap<String, String> = HashMap::new();

    for thread in threads {
        // Seed the map so top-level comments resolve to the post title.
        parent_texts.insert(thread.id.clone(), thread.title.clone());

        units.push(TextUnit {
            id: thread.id.clone(),
            created_at: thread.created_at,
            score: thread.score,
            payload: UnitPayload::Post {
                title: thread.title.clone(),
                url: thread.url.clone(),
            },
            sentiment: None,
            keywords: None,
        });

        // Pre-order: children pushed in reverse so the first reply is
        // popped first.
        let mut stack: Vec<&RawComment> = thread.comments.iter().rev().collect();
        while let Some(comment) = stack.pop() {
            if qualifies(comment) {
                let parent_text = parent_texts
                    .get(&comment.parent_id)
                    .cloned()
                    .unwrap_or_else(|| PARENT_UNAVAILABLE.to_string());
                parent_texts.insert(comment.id.clone(), comment.body.clone());

                units.push(TextUnit {
                    id: comment.id.clone(),
                    created_at: comment.created_at,
                    score: comment.score,
                    payload: UnitPayload::Comment {
                        body: comment.body.clone(),
                        parent_id: comment.parent_id.clone(),
                        parent_text,
                    },
                    sentiment: None,
                    keywords: None,
                });
            }

            for reply in comment.replies.iter().rev() {
                stack.push(reply);
            }
        }
    }

    units
}

fn qualifies(comment: &RawComment) -> bool {
    comment.score > SCORE_THRESHOLD && comment.body != TOMBSTONE
}

/// CLI entry point for `tpulse flatten`: raw corpus in, flat corpus out.
pub fn run_flatten(config: &Config, dry_run: bool) -> Result<()> {
    let threads = store::load_threads(&config.corpus.raw_path)?;
    let units = flatten(&threads);

    let posts = units.iter().filter(|u| u.is_post()).count();
    let comments = units.len() - posts;

    if dry_run {
        println!("flatten (dry-run)");
        println!("  threads: {}", threads.len());
        println!("  posts: {}", posts);
        println!("  comments: {}", comments);
        return Ok(());
    }

    store::save_units(&config.corpus.flat_path, &units)?;

    println!("flatten");
    println!("  threads: {}", threads.len());
    println!("  posts: {}", posts);
    println!("  comments: {}", comments);
    println!("  written: {}", config.corpus.flat_path.display());
    println!("ok");
    Ok(())
}
