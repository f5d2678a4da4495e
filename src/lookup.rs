//! Lookup normalization for repeated string attributes.
//!
//! Keywords, topics, tags, and categories each live in a deduplicated lookup
//! table (`id`, unique `name`). [`resolve_ids`] inserts whatever values are
//! new and then resolves the full requested set to ids through the same name
//! lookup, so an id is never generated separately from its name.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::LookupError;

/// Bound parameters per `IN (...)` query; well under SQLite's variable limit.
const MAX_BIND_PARAMS: usize = 500;

/// The four lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Keyword,
    Topic,
    Tag,
    Category,
}

impl LookupKind {
    pub fn table(&self) -> &'static str {
        match self {
            LookupKind::Keyword => "keywords",
            LookupKind::Topic => "topics",
            LookupKind::Tag => "tags",
            LookupKind::Category => "categories",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LookupKind::Keyword => "keyword",
            LookupKind::Topic => "topic",
            LookupKind::Tag => "tag",
            LookupKind::Category => "category",
        }
    }
}

/// Result of resolving one set of values.
#[derive(Debug, Default)]
pub struct ResolvedLookups {
    /// Value → lookup id, for every accepted value.
    pub ids: BTreeMap<String, i64>,
    /// Values that were not stored, with the reason.
    pub rejected: Vec<(String, LookupError)>,
}

impl ResolvedLookups {
    pub fn id_list(&self) -> Vec<i64> {
        self.ids.values().copied().collect()
    }
}

fn validate(value: &str) -> Result<(), LookupError> {
    if value.is_empty() {
        return Err(LookupError::Empty);
    }
    if value.contains('\0') {
        return Err(LookupError::ContainsNul(value.to_string()));
    }
    Ok(())
}

/// Insert unseen `values` into the `kind` lookup table and return the id of
/// every accepted value.
///
/// Already-present values are not an error. Invalid values and per-value
/// insert failures are reported in [`ResolvedLookups::rejected`]; only a
/// failure of the id query itself fails the call. Empty input never touches
/// the database.
pub async fn resolve_ids(
    conn: &mut SqliteConnection,
    kind: LookupKind,
    values: &BTreeSet<String>,
) -> Result<ResolvedLookups, sqlx::Error> {
    let mut resolved = ResolvedLookups::default();
    if values.is_empty() {
        return Ok(resolved);
    }

    let insert_sql = format!(
        "INSERT INTO {} (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
        kind.table()
    );

    let mut accepted: Vec<&String> = Vec::with_capacity(values.len());
    for value in values {
        if let Err(e) = validate(value) {
            resolved.rejected.push((value.clone(), e));
            continue;
        }
        match sqlx::query(&insert_sql).bind(value).execute(&mut *conn).await {
            Ok(_) => accepted.push(value),
            Err(e) => resolved.rejected.push((
                value.clone(),
                LookupError::Store {
                    value: value.clone(),
                    message: e.to_string(),
                },
            )),
        }
    }

    for chunk in accepted.chunks(MAX_BIND_PARAMS) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT name, id FROM {} WHERE name IN (", kind.table()));
        let mut separated = qb.separated(", ");
        for value in chunk {
            separated.push_bind(value.to_string());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        resolved.ids.extend(rows);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let (_tmp, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let r = resolve_ids(&mut conn, LookupKind::Keyword, &BTreeSet::new())
            .await
            .unwrap();
        assert!(r.ids.is_empty());
        assert!(r.rejected.is_empty());
    }

    #[tokio::test]
    async fn inserting_twice_yields_same_ids() {
        let (_tmp, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = resolve_ids(&mut conn, LookupKind::Tag, &set(&["rust", "music"]))
            .await
            .unwrap();
        let second = resolve_ids(&mut conn, LookupKind::Tag, &set(&["music", "rust", "live"]))
            .await
            .unwrap();

        assert_eq!(first.ids["rust"], second.ids["rust"]);
        assert_eq!(first.ids["music"], second.ids["music"]);
        assert_eq!(second.ids.len(), 3);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        let distinct: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT name) FROM tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(rows, distinct);
    }

    #[tokio::test]
    async fn kinds_use_separate_tables() {
        let (_tmp, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        resolve_ids(&mut conn, LookupKind::Keyword, &set(&["gaming"]))
            .await
            .unwrap();
        let topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(topics, 0);
    }

    #[tokio::test]
    async fn invalid_values_rejected_individually() {
        let (_tmp, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let r = resolve_ids(
            &mut conn,
            LookupKind::Category,
            &set(&["Music", "bad\0value", ""]),
        )
        .await
        .unwrap();

        assert_eq!(r.ids.len(), 1);
        assert!(r.ids.contains_key("Music"));
        assert_eq!(r.rejected.len(), 2);
        assert!(r
            .rejected
            .iter()
            .any(|(_, e)| matches!(e, LookupError::ContainsNul(_))));
        assert!(r.rejected.iter().any(|(_, e)| *e == LookupError::Empty));
    }

    #[tokio::test]
    async fn large_sets_span_multiple_queries() {
        let (_tmp, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let values: BTreeSet<String> = (0..1_200).map(|i| format!("kw{}", i)).collect();
        let r = resolve_ids(&mut conn, LookupKind::Keyword, &values)
            .await
            .unwrap();
        assert_eq!(r.ids.len(), 1_200);
    }
}
