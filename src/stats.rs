//! Database statistics and health overview.
//!
//! Summarizes what has been ingested: channel and video counts, lookup table
//! sizes, and how many records still have incomplete associations. Used by
//! `subs stats` to confirm that syncs and imports landed.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::lookup::LookupKind;

/// Row counts gathered by [`collect`].
#[derive(Debug, Default)]
pub struct StoreStats {
    pub channels: i64,
    pub channels_incomplete: i64,
    pub videos: i64,
    pub videos_incomplete: i64,
    pub formats: i64,
    /// `(table, rows)` per lookup kind.
    pub lookups: Vec<(&'static str, i64)>,
    pub last_import_ts: Option<i64>,
}

/// Gather statistics from an open pool.
pub async fn collect(pool: &SqlitePool) -> Result<StoreStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM channels) AS channels,
            (SELECT COUNT(*) FROM channels WHERE associations_complete = 0) AS channels_incomplete,
            (SELECT COUNT(*) FROM videos) AS videos,
            (SELECT COUNT(*) FROM videos WHERE associations_complete = 0) AS videos_incomplete,
            (SELECT COUNT(*) FROM video_formats) AS formats,
            (SELECT MAX(ts) FROM (
                SELECT MAX(imported_at) AS ts FROM channels
                UNION ALL
                SELECT MAX(imported_at) AS ts FROM videos
            )) AS last_import
        "#,
    )
    .fetch_one(pool)
    .await?;

    let mut lookups = Vec::new();
    for kind in [
        LookupKind::Keyword,
        LookupKind::Topic,
        LookupKind::Tag,
        LookupKind::Category,
    ] {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kind.table()))
            .fetch_one(pool)
            .await?;
        lookups.push((kind.table(), n));
    }

    Ok(StoreStats {
        channels: row.get("channels"),
        channels_incomplete: row.get("channels_incomplete"),
        videos: row.get("videos"),
        videos_incomplete: row.get("videos_incomplete"),
        formats: row.get("formats"),
        lookups,
        last_import_ts: row.get("last_import"),
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Subscription Browser — Database Stats");
    println!("=====================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Channels:    {} ({} incomplete)",
        stats.channels, stats.channels_incomplete
    );
    println!(
        "  Videos:      {} ({} incomplete)",
        stats.videos, stats.videos_incomplete
    );
    println!("  Formats:     {}", stats.formats);
    println!();
    println!("  Lookups:");
    for (table, n) in &stats.lookups {
        println!("    {:<12} {:>8}", table, n);
    }
    println!();
    println!(
        "  Last import: {}",
        match stats.last_import_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
