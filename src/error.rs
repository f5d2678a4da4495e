//! Typed errors for the cache, lookup, and per-record layers.
//!
//! Fatal, run-level failures (credentials, request errors, opening the store)
//! travel as [`anyhow::Error`]. The types here cover the outcomes a caller is
//! expected to branch on: a cache miss, a rejected lookup value, a rejected
//! record.

use std::path::PathBuf;

use crate::cache::CacheKey;

/// Errors returned by [`ContentCache`](crate::cache::ContentCache) implementations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No entry exists for the key. Expected control flow, not a fault.
    #[error("cache miss: {0}")]
    NotFound(CacheKey),

    /// A key segment was empty or contained the key separator.
    #[error("invalid cache key segment {segment:?}: {reason}")]
    InvalidKey {
        segment: String,
        reason: &'static str,
    },

    /// The storage root or an entry file could not be read or written.
    #[error("cache storage error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry exists but its payload could not be (de)serialized.
    #[error("cache entry {key} is corrupt: {source}")]
    Corrupt {
        key: CacheKey,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// True when the error only signals absence of the entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// A single lookup value that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("empty value")]
    Empty,
    #[error("value {0:?} contains a NUL character")]
    ContainsNul(String),
    #[error("value {value:?} could not be stored: {message}")]
    Store { value: String, message: String },
}

/// Reasons a whole record is rejected by the ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A video references a channel that has not been ingested.
    #[error("{video_id}: missing channel: channel ID = \"{channel_id}\"")]
    MissingChannel {
        video_id: String,
        channel_id: String,
    },

    /// The primary row could not be written.
    #[error("{external_id}: failed to save: {source}")]
    Store {
        external_id: String,
        #[source]
        source: sqlx::Error,
    },
}
