//! Where identifiers and records come from.
//!
//! - **Subscriptions**: the authenticated user's live subscription listing
//!   ([`subscription_channel_ids`]), cached under `subscriptions:mine`.
//! - **Takeout**: a CSV export whose first column lists channel ids
//!   ([`takeout_channel_ids`]).
//! - **Video metadata files**: info-JSON files found by walking
//!   directories ([`scan_video_files`]).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::{CacheKey, ContentCache, ContentCacheExt};
use crate::config::ImportConfig;
use crate::fetch::Page;
use crate::models::{SubscriptionRecord, VideoRecord};

/// A paginated listing of the caller's subscriptions.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscriptions_page(&self, page_token: Option<&str>)
        -> Result<Page<SubscriptionRecord>>;
}

/// Channel ids of every subscription, in listing order.
pub async fn subscription_channel_ids(
    source: &dyn SubscriptionSource,
    cache: &dyn ContentCache,
) -> Result<Vec<String>> {
    let key = CacheKey::new(["subscriptions", "mine"])?;
    match cache.get_json::<Vec<String>>(&key) {
        Ok(ids) => {
            tracing::info!(count = ids.len(), "subscription list served from cache");
            return Ok(ids);
        }
        Err(e) if !e.is_not_found() => {
            tracing::warn!(key = %key, error = %e, "ignoring unreadable cache entry");
        }
        Err(_) => {}
    }

    let mut ids = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = source
            .subscriptions_page(token.as_deref())
            .await
            .context("Failed to list subscriptions")?;
        ids.extend(
            page.items
                .into_iter()
                .map(|s| s.snippet.resource_id.channel_id)
                .filter(|id| !id.is_empty()),
        );
        match page.next_page_token {
            Some(next) if !next.is_empty() => {
                if token.as_deref() == Some(next.as_str()) {
                    bail!("subscription listing repeated page token {:?}", next);
                }
                token = Some(next);
            }
            _ => break,
        }
    }

    if let Err(e) = cache.put_json(&key, &ids) {
        tracing::warn!(key = %key, error = %e, "failed to cache subscription list");
    }
    Ok(ids)
}

/// Read channel ids from column 0 of a CSV export, skipping the header row.
pub fn takeout_channel_ids(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;

    let mut ids = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed to read row {} of {}", i + 2, path.display()))?;
        match record.get(0).map(str::trim) {
            Some(id) if !id.is_empty() => ids.push(id.to_string()),
            _ => tracing::debug!(row = i + 2, "skipping row without a channel id"),
        }
    }

    Ok(ids)
}

/// Outcome of walking metadata files.
#[derive(Debug, Default)]
pub struct VideoScan {
    pub records: Vec<VideoRecord>,
    /// Parsed files that describe something other than a video.
    pub skipped: usize,
    /// Files that could not be read or parsed.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Collect video records from files and directories.
///
/// Directories are walked recursively and filtered by the import globs
/// (matched against the path relative to the directory). Explicit file
/// arguments are always read. Output is sorted by file path.
pub fn scan_video_files(paths: &[PathBuf], import: &ImportConfig) -> Result<VideoScan> {
    let include_set = build_globset(&import.include_globs)?;
    let exclude_set = build_globset(&import.exclude_globs)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Import path does not exist: {}", root.display());
        }
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files.dedup();

    let mut scan = VideoScan::default();
    for path in files {
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|body| serde_json::from_str::<VideoRecord>(&body).map_err(|e| e.to_string()));
        match parsed {
            Ok(record) if record.is_video() => scan.records.push(record),
            Ok(_) => scan.skipped += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable metadata file");
                scan.unreadable.push((path, e));
            }
        }
    }

    Ok(scan)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
