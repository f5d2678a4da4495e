//! Content cache for raw upstream payloads.
//!
//! The [`ContentCache`] trait is a three-operation capability (`put`, `get`,
//! `has`) with interchangeable strategies:
//!
//! - **[`DiskCache`]**: one pretty-printed JSON file per key under a root
//!   directory. The root is created on construction.
//! - **[`NullCache`]**: stores nothing and never hits. Disables caching
//!   without branching at call sites.
//! - **[`RefreshCache`]**: wraps another cache. Writes pass through, reads
//!   always miss, so one run re-fetches everything while the next run reads
//!   the refreshed copies.
//!
//! Use [`open_cache`] to build the strategy selected by [`CacheMode`].
//!
//! # Keys
//!
//! A [`CacheKey`] is an ordered list of segments, written `channels:abc123`.
//! Segments may not be empty or contain [`KEY_SEPARATOR`]. On disk each
//! segment is percent-encoded outside `[A-Za-z0-9_-]` and segments are joined
//! with `.`, so two different keys never share a file.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CacheError;

/// Logical separator between key segments.
pub const KEY_SEPARATOR: char = ':';

const FILE_SEGMENT_DELIMITER: char = '.';
const FILE_EXTENSION: &str = "json";

// ═══════════════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════════════

/// An ordered, validated sequence of key segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    segments: Vec<String>,
}

impl CacheKey {
    /// Build a key from segments, rejecting empty segments and segments that
    /// contain [`KEY_SEPARATOR`].
    pub fn new<I, S>(segments: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(CacheError::InvalidKey {
                segment: String::new(),
                reason: "key has no segments",
            });
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(CacheError::InvalidKey {
                    segment: segment.clone(),
                    reason: "segment is empty",
                });
            }
            if segment.contains(KEY_SEPARATOR) {
                return Err(CacheError::InvalidKey {
                    segment: segment.clone(),
                    reason: "segment contains the key separator",
                });
            }
        }
        Ok(Self { segments })
    }

    /// Parse a `a:b:c` style key.
    pub fn parse(s: &str) -> Result<Self, CacheError> {
        Self::new(s.split(KEY_SEPARATOR))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// File name used by [`DiskCache`] for this key.
    pub fn file_name(&self) -> String {
        let mut name = self
            .segments
            .iter()
            .map(|s| encode_segment(s))
            .collect::<Vec<_>>()
            .join(&FILE_SEGMENT_DELIMITER.to_string());
        name.push('.');
        name.push_str(FILE_EXTENSION);
        name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(&KEY_SEPARATOR.to_string()))
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
// Cache trait
// ═══════════════════════════════════════════════════════════════════════

/// Key/value storage for fetched payloads.
pub trait ContentCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry.
    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError>;

    /// Return the stored value, or [`CacheError::NotFound`] when absent.
    fn get(&self, key: &CacheKey) -> Result<Value, CacheError>;

    /// Whether an entry is present. Never fails; an unreadable entry is
    /// reported as absent. Use [`get`](ContentCache::get) to tell the two apart.
    fn has(&self, key: &CacheKey) -> bool;
}

/// Typed helpers over any [`ContentCache`].
pub trait ContentCacheExt: ContentCache {
    fn put_json<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.put(key, &value)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<T, CacheError> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })
    }
}

impl<C: ContentCache + ?Sized> ContentCacheExt for C {}

// ============ Disk ============

/// Stores each entry as a JSON file under `root`.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open a disk cache, creating `root` if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: std::path::absolute(&root).unwrap_or_else(|_| root.clone()),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl ContentCache for DiskCache {
    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })?;

        // Write beside the entry and rename so a crash never leaves half a file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| CacheError::Io { path, source })
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        let path = self.entry_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(key.clone()))
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })
    }

    fn has(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }
}

// ============ Null ============

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl ContentCache for NullCache {
    fn put(&self, _key: &CacheKey, _value: &Value) -> Result<(), CacheError> {
        Ok(())
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        Err(CacheError::NotFound(key.clone()))
    }

    fn has(&self, _key: &CacheKey) -> bool {
        false
    }
}

// ============ Refresh ============

/// Write-through wrapper whose reads always miss.
pub struct RefreshCache {
    inner: Box<dyn ContentCache>,
}

impl RefreshCache {
    pub fn new(inner: Box<dyn ContentCache>) -> Self {
        Self { inner }
    }
}

impl ContentCache for RefreshCache {
    fn put(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        self.inner.put(key, value)
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        Err(CacheError::NotFound(key.clone()))
    }

    fn has(&self, _key: &CacheKey) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Strategy selection
// ═══════════════════════════════════════════════════════════════════════

/// Which cache strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Read and write the disk cache.
    #[default]
    Disk,
    /// No caching at all.
    Disabled,
    /// Re-fetch everything, writing fresh copies to disk.
    Refresh,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Disk => "disk",
            CacheMode::Disabled => "disabled",
            CacheMode::Refresh => "refresh",
        }
    }
}

/// Build the cache strategy for `mode`, rooted at `dir` where applicable.
pub fn open_cache(dir: &Path, mode: CacheMode) -> Result<Box<dyn ContentCache>, CacheError> {
    Ok(match mode {
        CacheMode::Disk => Box::new(DiskCache::new(dir)?),
        CacheMode::Disabled => Box::new(NullCache),
        CacheMode::Refresh => Box::new(RefreshCache::new(Box::new(DiskCache::new(dir)?))),
    })
}
