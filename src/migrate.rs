use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Schema statements, applied in order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS channels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        youtube_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        custom_url TEXT,
        branding_title TEXT,
        branding_description TEXT,
        subscriber_count INTEGER,
        video_count INTEGER,
        view_count INTEGER,
        uploads_playlist_id TEXT,
        associations_complete INTEGER NOT NULL DEFAULT 0,
        imported_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS channel_thumbnails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id INTEGER NOT NULL,
        size TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        url TEXT NOT NULL,
        UNIQUE(channel_id, size),
        FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        youtube_id TEXT NOT NULL UNIQUE,
        channel_id INTEGER NOT NULL,
        title TEXT,
        full_title TEXT,
        description TEXT,
        duration REAL,
        width INTEGER,
        height INTEGER,
        resolution TEXT,
        aspect_ratio REAL,
        uploaded_at INTEGER,
        webpage_url TEXT,
        original_url TEXT,
        availability TEXT,
        epoch INTEGER,
        format TEXT,
        format_id TEXT,
        format_note TEXT,
        ext TEXT,
        file_size INTEGER,
        tbr REAL,
        vbr REAL,
        abr REAL,
        asr INTEGER,
        dynamic_range TEXT,
        video_codec TEXT,
        audio_codec TEXT,
        associations_complete INTEGER NOT NULL DEFAULT 0,
        imported_at INTEGER NOT NULL,
        FOREIGN KEY (channel_id) REFERENCES channels(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_formats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id INTEGER NOT NULL,
        youtube_format_id TEXT,
        format TEXT,
        format_note TEXT,
        ext TEXT,
        container TEXT,
        resolution TEXT,
        width INTEGER,
        height INTEGER,
        fps REAL,
        aspect_ratio REAL,
        tbr REAL,
        vbr REAL,
        abr REAL,
        asr INTEGER,
        audio_channels INTEGER,
        video_codec TEXT,
        audio_codec TEXT,
        dynamic_range TEXT,
        file_size INTEGER,
        file_size_approx INTEGER,
        url TEXT,
        language TEXT,
        quality REAL,
        has_drm INTEGER,
        requested INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
    )
    "#,
    "CREATE TABLE IF NOT EXISTS keywords (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
    "CREATE TABLE IF NOT EXISTS topics (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
    "CREATE TABLE IF NOT EXISTS tags (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
    "CREATE TABLE IF NOT EXISTS categories (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
    r#"
    CREATE TABLE IF NOT EXISTS channels_keywords (
        channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
        keyword_id INTEGER NOT NULL REFERENCES keywords(id),
        PRIMARY KEY (channel_id, keyword_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS channels_topics (
        channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
        topic_id INTEGER NOT NULL REFERENCES topics(id),
        PRIMARY KEY (channel_id, topic_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos_tags (
        video_id INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id),
        PRIMARY KEY (video_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS videos_categories (
        video_id INTEGER NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id),
        PRIMARY KEY (video_id, category_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_videos_channel_id ON videos(channel_id)",
    "CREATE INDEX IF NOT EXISTS idx_video_formats_video_id ON video_formats(video_id)",
    "CREATE INDEX IF NOT EXISTS idx_videos_uploaded_at ON videos(uploaded_at DESC)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index that does not exist yet.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for (i, statement) in SCHEMA.iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to apply schema statement #{}", i + 1))?;
    }
    Ok(())
}
