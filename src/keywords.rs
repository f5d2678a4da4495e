//! Attribute value normalization ahead of lookup resolution.
//!
//! The channel branding payload carries keywords as one space-separated
//! string where multi-word keywords are double-quoted, e.g.
//! `tech "daily news" vlog`. That is a CSV record with a space delimiter, so
//! it is split with the `csv` reader rather than by hand.

use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// Split a branding keyword string into lower-cased keywords.
///
/// Quoted fields keep their inner whitespace. Empty input yields no keywords,
/// and empty fields from repeated spaces are dropped.
pub fn split_keywords(s: &str) -> Result<Vec<String>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_reader(s.as_bytes());

    let mut keywords = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to split keywords: {:?}", s))?;
        // Normally a single record; newlines in the payload start another.
        for field in record.iter() {
            let field = field.trim();
            if !field.is_empty() {
                keywords.push(field.to_lowercase());
            }
        }
    }

    Ok(keywords)
}

/// Trim, lower-case, and deduplicate free-form labels (keywords, tags).
pub fn normalize_labels<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Trim and deduplicate identifiers that are case-sensitive (topics, categories).
pub fn normalize_identifiers<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
