//! Record types that flow through the ingestion pipeline.
//!
//! [`ChannelRecord`] mirrors the channel resource returned by the upstream
//! channels endpoint; [`VideoRecord`] mirrors a video info-JSON metadata file.
//! Both are denormalized; the pipeline splits them into primary rows, owned
//! child rows (thumbnails, formats), and lookup associations.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Anything with an upstream (external) identifier.
pub trait ExternalId {
    fn external_id(&self) -> &str;
}

// ═══════════════════════════════════════════════════════════════════════
// Channels
// ═══════════════════════════════════════════════════════════════════════

/// A channel resource as returned by the upstream API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,
    #[serde(default)]
    pub snippet: ChannelSnippet,
    #[serde(default)]
    pub branding_settings: BrandingSettings,
    #[serde(default)]
    pub statistics: ChannelStatistics,
    #[serde(default)]
    pub topic_details: Option<TopicDetails>,
    #[serde(default)]
    pub content_details: ContentDetails,
}

impl ExternalId for ChannelRecord {
    fn external_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_url: Option<String>,
    /// Keyed by size name: `default`, `medium`, `high`, `standard`, `maxres`.
    #[serde(default)]
    pub thumbnails: BTreeMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandingSettings {
    #[serde(default)]
    pub channel: BrandingChannel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandingChannel {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Space-separated, quote-aware keyword list.
    #[serde(default)]
    pub keywords: Option<String>,
}

/// Channel statistics. The API encodes counts as decimal strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    #[serde(default, deserialize_with = "de_count")]
    pub view_count: Option<i64>,
    #[serde(default, deserialize_with = "de_count")]
    pub subscriber_count: Option<i64>,
    #[serde(default, deserialize_with = "de_count")]
    pub video_count: Option<i64>,
    #[serde(default)]
    pub hidden_subscriber_count: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDetails {
    #[serde(default)]
    pub topic_ids: Option<Vec<String>>,
    #[serde(default)]
    pub topic_categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    #[serde(default)]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

/// Accept a count as a JSON number, a decimal string, or null.
fn de_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(i64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Int(n)) => Ok(Some(n)),
        Some(Count::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// A subscription resource; only the subscribed channel id is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(default)]
    pub snippet: SubscriptionSnippet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub channel_id: String,
}

// ═══════════════════════════════════════════════════════════════════════
// Videos
// ═══════════════════════════════════════════════════════════════════════

/// Video metadata from an info-JSON file.
///
/// Only `id` is required; everything else may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "fulltitle", default)]
    pub full_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    /// Upload time, unix seconds.
    #[serde(rename = "timestamp", default)]
    pub uploaded_at: Option<i64>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub epoch: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(rename = "filesize_approx", default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub dynamic_range: Option<String>,
    #[serde(rename = "vcodec", default)]
    pub video_codec: Option<String>,
    #[serde(rename = "acodec", default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub vbr: Option<f64>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub asr: Option<i64>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub formats: Option<Vec<VideoFormat>>,
    #[serde(default)]
    pub requested_formats: Option<Vec<VideoFormat>>,
}

impl VideoRecord {
    /// Whether this metadata file describes a single video (as opposed to a
    /// playlist or channel dump). Files without `_type` are assumed to be videos.
    pub fn is_video(&self) -> bool {
        self.kind.as_deref().map_or(true, |k| k == "video")
    }
}

impl ExternalId for VideoRecord {
    fn external_id(&self) -> &str {
        &self.id
    }
}

/// One format descriptor. Audio-only, video-only, and muxed formats share
/// this shape, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoFormat {
    #[serde(rename = "format_id", default)]
    pub youtube_format_id: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub vbr: Option<f64>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub asr: Option<i64>,
    #[serde(default)]
    pub audio_channels: Option<i64>,
    #[serde(rename = "vcodec", default)]
    pub video_codec: Option<String>,
    #[serde(rename = "acodec", default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub dynamic_range: Option<String>,
    #[serde(rename = "filesize", default)]
    pub file_size: Option<i64>,
    #[serde(rename = "filesize_approx", default)]
    pub file_size_approx: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub has_drm: Option<bool>,
}
