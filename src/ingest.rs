//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one run: id source → batched fetch →
//! per-record persistence → summary. Each record is written in its own
//! transaction:
//!
//! 1. Resolve the parent (a video's channel) by external id.
//! 2. Upsert the primary row by external id.
//! 3. Replace owned child rows (channel thumbnails, video formats).
//! 4. Resolve lookup values and write association rows.
//!
//! A failure in step 1 or 2 rejects the record and rolls the transaction
//! back, as does a transaction that cannot be opened. Failures in steps 3–4
//! are collected on the outcome; the primary row stays, flagged with
//! `associations_complete = 0`. Nothing a single record does aborts the run.

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::associations::{self, AssociationKind};
use crate::cache::{open_cache, ContentCache};
use crate::config::Config;
use crate::credentials;
use crate::db;
use crate::error::RecordError;
use crate::fetch::{fetch_batched, BatchSource, FetchReport};
use crate::keywords::{normalize_identifiers, normalize_labels, split_keywords};
use crate::lookup::{self, LookupKind};
use crate::migrate;
use crate::models::{ChannelRecord, VideoFormat, VideoRecord};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::sources;
use crate::youtube::YouTubeClient;

/// What happened to one record.
#[derive(Debug)]
pub enum RecordOutcome {
    Saved {
        external_id: String,
        local_id: i64,
    },
    /// Primary row saved; some child rows or associations were not.
    Partial {
        external_id: String,
        local_id: i64,
        failures: Vec<String>,
    },
    Rejected {
        external_id: String,
        reason: RecordError,
    },
}

impl RecordOutcome {
    pub fn external_id(&self) -> &str {
        match self {
            RecordOutcome::Saved { external_id, .. }
            | RecordOutcome::Partial { external_id, .. }
            | RecordOutcome::Rejected { external_id, .. } => external_id,
        }
    }

    /// Local row id, unless the record was rejected.
    pub fn local_id(&self) -> Option<i64> {
        match self {
            RecordOutcome::Saved { local_id, .. } | RecordOutcome::Partial { local_id, .. } => {
                Some(*local_id)
            }
            RecordOutcome::Rejected { .. } => None,
        }
    }
}

/// Accumulated outcomes of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<RecordOutcome>,
    /// Present when the records came through the batched fetcher.
    pub fetch: Option<FetchReport>,
}

impl RunSummary {
    pub fn saved(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Saved { .. }))
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Partial { .. }))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Rejected { .. }))
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    /// Print the outcome counts in the `sync` summary layout.
    pub fn print(&self, title: &str) {
        println!("{}", title);
        match &self.fetch {
            Some(report) => {
                println!(
                    "  fetched: {} of {} requested",
                    report.returned(),
                    report.requested()
                );
            }
            None => println!("  fetched: {}", self.outcomes.len()),
        }
        println!("  saved: {}", self.saved());
        println!("  partial: {}", self.partial());
        println!("  rejected: {}", self.rejected());
        if let Some(report) = &self.fetch {
            println!("  missing upstream: {}", report.shortfall());
        }
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

// ═══════════════════════════════════════════════════════════════════════
// Channels
// ═══════════════════════════════════════════════════════════════════════

/// Fetch `ids` through `source` and ingest whatever comes back.
pub async fn sync_channels<S>(
    pool: &SqlitePool,
    source: &S,
    cache: &dyn ContentCache,
    ids: &[String],
    page_size: usize,
    progress: &dyn SyncProgressReporter,
) -> Result<RunSummary>
where
    S: BatchSource<Record = ChannelRecord>,
{
    let outcome = fetch_batched(source, cache, ids, page_size, progress).await?;
    let mut summary = ingest_channels(pool, &outcome.records, progress).await?;
    summary.fetch = Some(outcome.report);
    Ok(summary)
}

/// Persist channel records in order.
pub async fn ingest_channels(
    pool: &SqlitePool,
    records: &[ChannelRecord],
    progress: &dyn SyncProgressReporter,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let total = records.len() as u64;

    for (i, record) in records.iter().enumerate() {
        let outcome = ingest_channel(pool, record).await?;
        log_outcome("channel", &outcome);
        summary.outcomes.push(outcome);
        progress.report(SyncProgressEvent::Ingesting {
            kind: "channels".to_string(),
            n: i as u64 + 1,
            total,
        });
    }

    Ok(summary)
}

async fn ingest_channel(pool: &SqlitePool, record: &ChannelRecord) -> Result<RecordOutcome> {
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(source) => return Ok(rejected_store(&record.id, source)),
    };

    let local_id = match upsert_channel(&mut *tx, record).await {
        Ok(id) => id,
        Err(source) => {
            tx.rollback().await.ok();
            return Ok(rejected_store(&record.id, source));
        }
    };

    let mut failures = Vec::new();

    if let Err(e) = replace_thumbnails(&mut *tx, local_id, record).await {
        failures.push(format!("thumbnails: {}", e));
    }

    let branding = record.branding_settings.channel.keywords.as_deref().unwrap_or("");
    match split_keywords(branding) {
        Ok(keywords) => {
            let keywords = normalize_labels(keywords);
            attach(
                &mut *tx,
                LookupKind::Keyword,
                AssociationKind::ChannelKeyword,
                local_id,
                &keywords,
                &mut failures,
            )
            .await;
        }
        Err(e) => failures.push(format!("keywords: {:#}", e)),
    }

    let topics = record
        .topic_details
        .as_ref()
        .map(|t| {
            let ids = t.topic_ids.iter().flatten();
            let categories = t.topic_categories.iter().flatten();
            normalize_identifiers(ids.chain(categories))
        })
        .unwrap_or_default();
    attach(
        &mut *tx,
        LookupKind::Topic,
        AssociationKind::ChannelTopic,
        local_id,
        &topics,
        &mut failures,
    )
    .await;

    finish(tx, "channels", &record.id, local_id, failures).await
}

async fn upsert_channel(
    conn: &mut SqliteConnection,
    record: &ChannelRecord,
) -> Result<i64, sqlx::Error> {
    let branding = &record.branding_settings.channel;
    let stats = &record.statistics;

    sqlx::query_scalar(
        r#"
        INSERT INTO channels (youtube_id, title, description, custom_url,
            branding_title, branding_description, subscriber_count, video_count,
            view_count, uploads_playlist_id, associations_complete, imported_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        ON CONFLICT(youtube_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            custom_url = excluded.custom_url,
            branding_title = excluded.branding_title,
            branding_description = excluded.branding_description,
            subscriber_count = excluded.subscriber_count,
            video_count = excluded.video_count,
            view_count = excluded.view_count,
            uploads_playlist_id = excluded.uploads_playlist_id,
            associations_complete = 0,
            imported_at = excluded.imported_at
        RETURNING id
        "#,
    )
    .bind(&record.id)
    .bind(&record.snippet.title)
    .bind(&record.snippet.description)
    .bind(&record.snippet.custom_url)
    .bind(&branding.title)
    .bind(&branding.description)
    .bind(stats.subscriber_count)
    .bind(stats.video_count)
    .bind(stats.view_count)
    .bind(&record.content_details.related_playlists.uploads)
    .bind(now_ts())
    .fetch_one(&mut *conn)
    .await
}

async fn replace_thumbnails(
    conn: &mut SqliteConnection,
    channel_id: i64,
    record: &ChannelRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM channel_thumbnails WHERE channel_id = ?")
        .bind(channel_id)
        .execute(&mut *conn)
        .await?;

    for (size, thumb) in &record.snippet.thumbnails {
        sqlx::query(
            "INSERT INTO channel_thumbnails (channel_id, size, width, height, url) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(channel_id)
        .bind(size)
        .bind(thumb.width)
        .bind(thumb.height)
        .bind(&thumb.url)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Videos
// ═══════════════════════════════════════════════════════════════════════

/// Persist video records in order. Each video's channel must already exist.
pub async fn ingest_videos(
    pool: &SqlitePool,
    records: &[VideoRecord],
    progress: &dyn SyncProgressReporter,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let total = records.len() as u64;

    for (i, record) in records.iter().enumerate() {
        let outcome = ingest_video(pool, record).await?;
        log_outcome("video", &outcome);
        summary.outcomes.push(outcome);
        progress.report(SyncProgressEvent::Ingesting {
            kind: "videos".to_string(),
            n: i as u64 + 1,
            total,
        });
    }

    Ok(summary)
}

async fn ingest_video(pool: &SqlitePool, record: &VideoRecord) -> Result<RecordOutcome> {
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(source) => return Ok(rejected_store(&record.id, source)),
    };

    let channel_external = record.channel_id.as_deref().unwrap_or("").trim();
    let channel_id: Option<i64> = if channel_external.is_empty() {
        None
    } else {
        match sqlx::query_scalar("SELECT id FROM channels WHERE youtube_id = ?")
            .bind(channel_external)
            .fetch_optional(&mut *tx)
            .await
        {
            Ok(id) => id,
            Err(source) => {
                tx.rollback().await.ok();
                return Ok(rejected_store(&record.id, source));
            }
        }
    };

    let Some(channel_id) = channel_id else {
        tx.rollback().await.ok();
        return Ok(RecordOutcome::Rejected {
            external_id: record.id.clone(),
            reason: RecordError::MissingChannel {
                video_id: record.id.clone(),
                channel_id: channel_external.to_string(),
            },
        });
    };

    let local_id = match upsert_video(&mut *tx, channel_id, record).await {
        Ok(id) => id,
        Err(source) => {
            tx.rollback().await.ok();
            return Ok(rejected_store(&record.id, source));
        }
    };

    let mut failures = Vec::new();

    if let Err(e) = replace_formats(&mut *tx, local_id, record).await {
        failures.push(format!("formats: {}", e));
    }

    let tags = normalize_labels(record.tags.iter().flatten());
    attach(
        &mut *tx,
        LookupKind::Tag,
        AssociationKind::VideoTag,
        local_id,
        &tags,
        &mut failures,
    )
    .await;

    let categories = normalize_identifiers(record.categories.iter().flatten());
    attach(
        &mut *tx,
        LookupKind::Category,
        AssociationKind::VideoCategory,
        local_id,
        &categories,
        &mut failures,
    )
    .await;

    finish(tx, "videos", &record.id, local_id, failures).await
}

fn rejected_store(external_id: &str, source: sqlx::Error) -> RecordOutcome {
    RecordOutcome::Rejected {
        external_id: external_id.to_string(),
        reason: RecordError::Store {
            external_id: external_id.to_string(),
            source,
        },
    }
}

async fn upsert_video(
    conn: &mut SqliteConnection,
    channel_id: i64,
    v: &VideoRecord,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO videos (youtube_id, channel_id, title, full_title, description,
            duration, width, height, resolution, aspect_ratio, uploaded_at,
            webpage_url, original_url, availability, epoch, format, format_id,
            format_note, ext, file_size, tbr, vbr, abr, asr, dynamic_range,
            video_codec, audio_codec, associations_complete, imported_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        ON CONFLICT(youtube_id) DO UPDATE SET
            channel_id = excluded.channel_id,
            title = excluded.title,
            full_title = excluded.full_title,
            description = excluded.description,
            duration = excluded.duration,
            width = excluded.width,
            height = excluded.height,
            resolution = excluded.resolution,
            aspect_ratio = excluded.aspect_ratio,
            uploaded_at = excluded.uploaded_at,
            webpage_url = excluded.webpage_url,
            original_url = excluded.original_url,
            availability = excluded.availability,
            epoch = excluded.epoch,
            format = excluded.format,
            format_id = excluded.format_id,
            format_note = excluded.format_note,
            ext = excluded.ext,
            file_size = excluded.file_size,
            tbr = excluded.tbr,
            vbr = excluded.vbr,
            abr = excluded.abr,
            asr = excluded.asr,
            dynamic_range = excluded.dynamic_range,
            video_codec = excluded.video_codec,
            audio_codec = excluded.audio_codec,
            associations_complete = 0,
            imported_at = excluded.imported_at
        RETURNING id
        "#,
    )
    .bind(&v.id)
    .bind(channel_id)
    .bind(&v.title)
    .bind(&v.full_title)
    .bind(&v.description)
    .bind(v.duration)
    .bind(v.width)
    .bind(v.height)
    .bind(&v.resolution)
    .bind(v.aspect_ratio)
    .bind(v.uploaded_at)
    .bind(&v.webpage_url)
    .bind(&v.original_url)
    .bind(&v.availability)
    .bind(v.epoch)
    .bind(&v.format)
    .bind(&v.format_id)
    .bind(&v.format_note)
    .bind(&v.ext)
    .bind(v.file_size)
    .bind(v.tbr)
    .bind(v.vbr)
    .bind(v.abr)
    .bind(v.asr)
    .bind(&v.dynamic_range)
    .bind(&v.video_codec)
    .bind(&v.audio_codec)
    .bind(now_ts())
    .fetch_one(&mut *conn)
    .await
}

async fn replace_formats(
    conn: &mut SqliteConnection,
    video_id: i64,
    record: &VideoRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM video_formats WHERE video_id = ?")
        .bind(video_id)
        .execute(&mut *conn)
        .await?;

    let available = record.formats.iter().flatten().map(|f| (f, false));
    let requested = record.requested_formats.iter().flatten().map(|f| (f, true));
    for (format, is_requested) in available.chain(requested) {
        insert_format(conn, video_id, format, is_requested).await?;
    }

    Ok(())
}

async fn insert_format(
    conn: &mut SqliteConnection,
    video_id: i64,
    f: &VideoFormat,
    requested: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO video_formats (video_id, youtube_format_id, format, format_note,
            ext, container, resolution, width, height, fps, aspect_ratio, tbr, vbr,
            abr, asr, audio_channels, video_codec, audio_codec, dynamic_range,
            file_size, file_size_approx, url, language, quality, has_drm, requested)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(video_id)
    .bind(&f.youtube_format_id)
    .bind(&f.format)
    .bind(&f.format_note)
    .bind(&f.ext)
    .bind(&f.container)
    .bind(&f.resolution)
    .bind(f.width)
    .bind(f.height)
    .bind(f.fps)
    .bind(f.aspect_ratio)
    .bind(f.tbr)
    .bind(f.vbr)
    .bind(f.abr)
    .bind(f.asr)
    .bind(f.audio_channels)
    .bind(&f.video_codec)
    .bind(&f.audio_codec)
    .bind(&f.dynamic_range)
    .bind(f.file_size)
    .bind(f.file_size_approx)
    .bind(&f.url)
    .bind(&f.language)
    .bind(f.quality)
    .bind(f.has_drm)
    .bind(requested)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Shared steps
// ═══════════════════════════════════════════════════════════════════════

/// Resolve `values` in the `lookup` table and link them to `entity_id`.
/// Every problem is appended to `failures`.
async fn attach(
    conn: &mut SqliteConnection,
    lookup: LookupKind,
    association: AssociationKind,
    entity_id: i64,
    values: &BTreeSet<String>,
    failures: &mut Vec<String>,
) {
    let resolved = match lookup::resolve_ids(conn, lookup, values).await {
        Ok(resolved) => resolved,
        Err(e) => {
            failures.push(format!("{}: {}", lookup.table(), e));
            return;
        }
    };

    for (_, err) in &resolved.rejected {
        failures.push(format!("{}: {}", lookup.label(), err));
    }

    if let Err(e) = associations::link(conn, association, entity_id, &resolved.id_list()).await {
        failures.push(format!("{}: {}", association.table(), e));
    }
}

/// Record association completeness and commit.
async fn finish(
    mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
    table: &str,
    external_id: &str,
    local_id: i64,
    mut failures: Vec<String>,
) -> Result<RecordOutcome> {
    let sql = format!("UPDATE {} SET associations_complete = ? WHERE id = ?", table);
    if let Err(e) = sqlx::query(&sql)
        .bind(failures.is_empty())
        .bind(local_id)
        .execute(&mut *tx)
        .await
    {
        failures.push(format!("associations_complete: {}", e));
    }

    if let Err(source) = tx.commit().await {
        return Ok(rejected_store(external_id, source));
    }

    Ok(if failures.is_empty() {
        RecordOutcome::Saved {
            external_id: external_id.to_string(),
            local_id,
        }
    } else {
        RecordOutcome::Partial {
            external_id: external_id.to_string(),
            local_id,
            failures,
        }
    })
}

fn log_outcome(kind: &str, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Saved { external_id, local_id } => {
            tracing::debug!(kind, external_id = %external_id, local_id, "saved");
        }
        RecordOutcome::Partial {
            external_id,
            failures,
            ..
        } => {
            tracing::warn!(kind, external_id = %external_id, failures = ?failures, "saved with incomplete associations");
        }
        RecordOutcome::Rejected { external_id, reason } => {
            tracing::warn!(kind, external_id = %external_id, reason = %reason, "rejected");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CLI entry points
// ═══════════════════════════════════════════════════════════════════════

async fn open_store(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    Ok(pool)
}

async fn sync_channel_ids(
    config: &Config,
    title: &str,
    ids: IdSource<'_>,
    progress: &dyn SyncProgressReporter,
) -> Result<()> {
    let provider = credentials::from_config(&config.api);
    let client = YouTubeClient::new(&config.api, provider.as_ref())?;
    let cache = open_cache(&config.cache.dir, config.cache.mode)?;

    let ids = match ids {
        IdSource::Subscriptions => {
            sources::subscription_channel_ids(&client, cache.as_ref()).await?
        }
        IdSource::Takeout(path) => sources::takeout_channel_ids(path)?,
    };
    tracing::info!(count = ids.len(), cache = config.cache.mode.as_str(), "channel ids collected");

    let pool = open_store(config).await?;
    let summary = sync_channels(
        &pool,
        &client,
        cache.as_ref(),
        &ids,
        config.api.page_size,
        progress,
    )
    .await?;

    summary.print(title);
    println!("ok");

    pool.close().await;
    Ok(())
}

enum IdSource<'a> {
    Subscriptions,
    Takeout(&'a Path),
}

/// `subs sync subscriptions`
pub async fn run_sync_subscriptions(
    config: &Config,
    progress: &dyn SyncProgressReporter,
) -> Result<()> {
    sync_channel_ids(config, "sync subscriptions", IdSource::Subscriptions, progress).await
}

/// `subs sync takeout <csv>`
pub async fn run_sync_takeout(
    config: &Config,
    path: &Path,
    progress: &dyn SyncProgressReporter,
) -> Result<()> {
    sync_channel_ids(config, "sync takeout", IdSource::Takeout(path), progress).await
}

/// `subs import videos <paths...>`
pub async fn run_import_videos(
    config: &Config,
    paths: &[PathBuf],
    progress: &dyn SyncProgressReporter,
) -> Result<()> {
    let scan = sources::scan_video_files(paths, &config.import)?;
    let pool = open_store(config).await?;
    let summary = ingest_videos(&pool, &scan.records, progress).await?;

    summary.print("import videos");
    println!("  skipped: {}", scan.skipped);
    println!("  unreadable: {}", scan.unreadable.len());
    println!("ok");

    pool.close().await;
    Ok(())
}
