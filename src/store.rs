//! JSON flat-file persistence for the raw and enriched corpora.
//!
//! Each corpus is a single ordered JSON array. Loads distinguish a missing
//! file from a malformed one so the serving layer can answer not-found vs.
//! parse-error; writes go through a temp file and rename so a crashed run
//! never leaves a half-written corpus behind.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{RawThread, TextUnit};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corpus file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("corpus file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn load_units(path: &Path) -> Result<Vec<TextUnit>, StoreError> {
    load_json(path)
}

pub fn load_threads(path: &Path) -> Result<Vec<RawThread>, StoreError> {
    load_json(path)
}

/// Guard-side load: absent or corrupt prior state is a cold start, never
/// a fatal error.
pub fn load_threads_or_empty(path: &Path) -> Vec<RawThread> {
    match load_threads(path) {
        Ok(threads) => threads,
        Err(StoreError::NotFound { .. }) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "prior raw corpus unreadable, starting cold");
            Vec::new()
        }
    }
}

pub fn save_units(path: &Path, units: &[TextUnit]) -> Result<(), StoreError> {
    save_json(path, units)
}

pub fn save_threads(path: &Path, threads: &[RawThread]) -> Result<(), StoreError> {
    save_json(path, threads)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_json<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let io_err = |e: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(items).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
