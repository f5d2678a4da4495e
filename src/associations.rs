//! Many-to-many join rows between primary entities and lookup values.

use sqlx::SqliteConnection;

/// The four join tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    ChannelKeyword,
    ChannelTopic,
    VideoTag,
    VideoCategory,
}

impl AssociationKind {
    /// `(table, entity column, lookup column)`.
    fn shape(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            AssociationKind::ChannelKeyword => ("channels_keywords", "channel_id", "keyword_id"),
            AssociationKind::ChannelTopic => ("channels_topics", "channel_id", "topic_id"),
            AssociationKind::VideoTag => ("videos_tags", "video_id", "tag_id"),
            AssociationKind::VideoCategory => ("videos_categories", "video_id", "category_id"),
        }
    }

    pub fn table(&self) -> &'static str {
        self.shape().0
    }
}

/// Link `entity_id` to every id in `lookup_ids`.
///
/// Pairs that already exist are skipped silently. Returns the number of rows
/// actually inserted.
pub async fn link(
    conn: &mut SqliteConnection,
    kind: AssociationKind,
    entity_id: i64,
    lookup_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if lookup_ids.is_empty() {
        return Ok(0);
    }

    let (table, entity_col, lookup_col) = kind.shape();
    let sql = format!(
        "INSERT INTO {} ({}, {}) VALUES (?, ?) ON CONFLICT DO NOTHING",
        table, entity_col, lookup_col
    );

    let mut inserted = 0u64;
    for lookup_id in lookup_ids {
        let result = sqlx::query(&sql)
            .bind(entity_id)
            .bind(lookup_id)
            .execute(&mut *conn)
            .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
