//! # ThreadPulse
//!
//! A sentiment pipeline for discussion threads.
//!
//! ThreadPulse fetches threaded discussions from a search source, flattens
//! each comment tree into a linear corpus of text units, enriches every
//! unit with a sentiment label and keywords from a local LLM oracle, and
//! serves aggregate views (sentiment over time, keyword frequencies, top
//! posts) over a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │  Source  │──▶│ Flattener │──▶│  Oracle  │──▶│ Enriched  │
//! │ file/http│   │ tree→list │   │  Ollama  │   │  corpus   │
//! └──────────┘   └───────────┘   └──────────┘   └────┬──────┘
//!                                                    │
//!                                ┌───────────────────┤
//!                                ▼                   ▼
//!                           ┌──────────┐       ┌──────────┐
//!                           │   CLI    │       │   HTTP   │
//!                           │ (tpulse) │       │  (axum)  │
//!                           └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tpulse fetch                  # pull threads from the configured source
//! tpulse flatten                # comment trees → flat unit corpus
//! tpulse enrich                 # sentiment + keywords via the oracle
//! tpulse serve                  # start the query server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`source`] | Thread search sources (file dump, HTTP) |
//! | [`ingest`] | Fetch orchestration and duplicate suppression |
//! | [`flatten`] | Comment-tree flattening |
//! | [`oracle`] | LLM oracle client |
//! | [`enrich`] | Enrichment driver |
//! | [`aggregate`] | Timeline, keyword, and ranking queries |
//! | [`server`] | HTTP query server |
//! | [`store`] | Corpus persistence |

pub mod aggregate;
pub mod config;
pub mod enrich;
pub mod flatten;
pub mod ingest;
pub mod models;
pub mod oracle;
pub mod retry;
pub mod server;
pub mod source;
pub mod stats;
pub mod store;
