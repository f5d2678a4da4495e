//! Chunked bulk lookups against a page-size-limited upstream.
//!
//! [`fetch_batched`] splits an identifier list into consecutive chunks of at
//! most `page_size`, issues one lookup per chunk, and drains every result
//! page of that lookup before moving on. The upstream silently omits ids it
//! cannot resolve, so each chunk's requested and returned counts are compared
//! and the difference is reported in a [`FetchReport`]. A shortfall is a
//! warning; a request error aborts the whole fetch.
//!
//! The content cache is consulted per chunk: a hit replays the chunk's
//! records from the cache and skips the network, and every freshly drained
//! chunk is written back.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::cache::{CacheKey, ContentCache, ContentCacheExt};
use crate::models::ExternalId;
use crate::progress::{SyncProgressEvent, SyncProgressReporter};

/// One page of an upstream listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// An upstream endpoint that resolves a bounded list of ids to records.
#[async_trait]
pub trait BatchSource: Send + Sync {
    type Record: ExternalId + Serialize + DeserializeOwned + Send;

    /// Cache namespace for this source's chunks (e.g. `"channels"`).
    fn kind(&self) -> &str;

    /// Fetch one result page for `ids`. `page_token` is `None` for the first
    /// page and the previous page's `next_page_token` afterwards.
    async fn fetch_page(
        &self,
        ids: &[String],
        page_token: Option<&str>,
    ) -> Result<Page<Self::Record>>;
}

/// Requested vs. returned counts for one chunk.
///
/// `requested` and `returned` count distinct ids, so repeated input ids and
/// repeated response records never mask or invent a shortfall.
#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    pub index: usize,
    /// Ids sent in the request, repeats included.
    pub sent: usize,
    pub requested: usize,
    pub returned: usize,
    /// Requested ids with no record in the response.
    pub missing_ids: Vec<String>,
    /// Records dropped because their id was already returned in this chunk.
    pub repeated: usize,
    pub from_cache: bool,
}

impl ChunkReport {
    pub fn shortfall(&self) -> usize {
        self.missing_ids.len()
    }
}

/// Per-chunk accounting for a whole fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub chunks: Vec<ChunkReport>,
    /// Ids of records the upstream returned without being asked for; dropped.
    pub unexpected_ids: Vec<String>,
}

impl FetchReport {
    pub fn requested(&self) -> usize {
        self.chunks.iter().map(|c| c.requested).sum()
    }

    pub fn returned(&self) -> usize {
        self.chunks.iter().map(|c| c.returned).sum()
    }

    pub fn shortfall(&self) -> usize {
        self.chunks.iter().map(|c| c.shortfall()).sum()
    }

    pub fn missing_ids(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .flat_map(|c| c.missing_ids.iter().map(String::as_str))
            .collect()
    }

    /// Number of chunks that went to the network.
    pub fn requests_issued(&self) -> usize {
        self.chunks.iter().filter(|c| !c.from_cache).count()
    }
}

/// Records plus the accounting that produced them.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub records: Vec<T>,
    pub report: FetchReport,
}

/// Cache key for one chunk: `<kind>:<sha256 of the chunk's ids>`.
pub fn chunk_cache_key(kind: &str, ids: &[String]) -> Result<CacheKey> {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    Ok(CacheKey::new([kind.to_string(), digest])?)
}

/// Fetch every id in `ids` through `source`, `page_size` ids per request.
///
/// Output records keep the upstream's order. Within a chunk each id yields at
/// most one record: repeated input ids are requested as given, and a record
/// the upstream returns more than once is kept only the first time.
pub async fn fetch_batched<S: BatchSource>(
    source: &S,
    cache: &dyn ContentCache,
    ids: &[String],
    page_size: usize,
    progress: &dyn SyncProgressReporter,
) -> Result<FetchOutcome<S::Record>> {
    if page_size == 0 {
        bail!("page size must be > 0");
    }

    let chunk_count = ids.len().div_ceil(page_size);
    let mut records = Vec::with_capacity(ids.len());
    let mut report = FetchReport::default();

    for (index, chunk) in ids.chunks(page_size).enumerate() {
        progress.report(SyncProgressEvent::Fetching {
            kind: source.kind().to_string(),
            chunk: index as u64 + 1,
            chunks: chunk_count as u64,
        });

        let key = chunk_cache_key(source.kind(), chunk)?;
        let (fetched, from_cache) = match cache.get_json::<Vec<S::Record>>(&key) {
            Ok(cached) => {
                tracing::debug!(
                    kind = source.kind(),
                    chunk = index + 1,
                    key = %key,
                    "chunk served from cache"
                );
                (cached, true)
            }
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(key = %key, error = %e, "ignoring unreadable cache entry");
                }
                let fetched = drain_chunk(source, chunk)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to fetch {} chunk {}/{}",
                            source.kind(),
                            index + 1,
                            chunk_count
                        )
                    })?;
                if let Err(e) = cache.put_json(&key, &fetched) {
                    tracing::warn!(key = %key, error = %e, "failed to cache chunk");
                }
                (fetched, false)
            }
        };

        let requested: HashSet<&str> = chunk.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut repeated = 0usize;
        for record in fetched {
            let id = record.external_id().to_string();
            if !requested.contains(id.as_str()) {
                tracing::warn!(
                    kind = source.kind(),
                    id = %id,
                    "dropping record that was not requested"
                );
                report.unexpected_ids.push(id);
                continue;
            }
            if !seen.insert(id) {
                repeated += 1;
                continue;
            }
            records.push(record);
        }

        let mut missing_ids: Vec<String> = Vec::new();
        for id in chunk {
            if !seen.contains(id) && !missing_ids.contains(id) {
                missing_ids.push(id.clone());
            }
        }

        let chunk_report = ChunkReport {
            index,
            sent: chunk.len(),
            requested: requested.len(),
            returned: seen.len(),
            missing_ids,
            repeated,
            from_cache,
        };

        if repeated > 0 {
            tracing::debug!(
                kind = source.kind(),
                chunk = index + 1,
                repeated,
                "dropping repeated records"
            );
        }

        if !chunk_report.missing_ids.is_empty() {
            tracing::warn!(
                kind = source.kind(),
                chunk = index + 1,
                requested = chunk_report.requested,
                returned = chunk_report.returned,
                missing = chunk_report.shortfall(),
                missing_ids = ?chunk_report.missing_ids,
                "upstream dropped ids it could not resolve"
            );
        }

        report.chunks.push(chunk_report);
    }

    Ok(FetchOutcome { records, report })
}

/// Request one chunk and follow `next_page_token` until exhausted.
async fn drain_chunk<S: BatchSource>(source: &S, chunk: &[String]) -> Result<Vec<S::Record>> {
    let mut records = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = source.fetch_page(chunk, token.as_deref()).await?;
        records.extend(page.items);

        match page.next_page_token {
            Some(next) if !next.is_empty() => {
                if token.as_deref() == Some(next.as_str()) {
                    bail!("upstream repeated page token {:?}", next);
                }
                token = Some(next);
            }
            _ => break,
        }
    }

    Ok(records)
}
