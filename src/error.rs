// src/error.rs
//! Error types for each pipeline stage.
//!
//! Per-unit errors (`DecodeError`, a single `PersistenceError`) are contained
//! inside a drain pass. Only `ConsumerError` stops the loop.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty input unit")]
    Empty,
    #[error("invalid message record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input source {} does not exist yet", .0.display())]
    Unavailable(PathBuf),
    #[error("reading input source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("creating store directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("opening insight store at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("creating insight schema: {0}")]
    Schema(#[source] rusqlite::Error),
    #[error("storing insight for author {author:?}: {source}")]
    Insert {
        author: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("querying insights: {0}")]
    Query(#[source] rusqlite::Error),
}

/// Terminal conditions: the loop transitions to Stopped and returns one of these.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("input source failed {failures} times in a row: {last}")]
    SourceFailed { failures: u32, last: SourceError },
    #[error("insight store failed {failures} times in a row: {last}")]
    StoreFailed {
        failures: u32,
        last: PersistenceError,
    },
}
