//! In-process fake of the upstream channel and subscription endpoints.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "test-token";

/// Behavior knobs and request log of the fake upstream.
#[derive(Default)]
pub struct Upstream {
    /// Channel ids the fake pretends not to know.
    pub missing: HashSet<String>,
    /// Items per channels page; 0 means everything on one page.
    pub channel_page_items: usize,
    /// Subscription pages, each a list of channel ids.
    pub subscription_pages: Vec<Vec<String>>,
    /// Count of channel lookup requests (all pages).
    pub channel_requests: AtomicUsize,
    /// `id` parameter of every first-page channel lookup.
    pub channel_id_params: Mutex<Vec<String>>,
}

impl Upstream {
    pub fn channel_requests(&self) -> usize {
        self.channel_requests.load(Ordering::SeqCst)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn channel_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "snippet": {
            "title": format!("Channel {}", id),
            "description": "",
            "thumbnails": {
                "default": {"url": format!("https://i.example/{}.jpg", id), "width": 88, "height": 88}
            }
        },
        "brandingSettings": {"channel": {"keywords": "tech \"daily news\" vlog"}},
        "statistics": {"viewCount": "100", "subscriberCount": "10", "videoCount": "3"},
        "topicDetails": {"topicCategories": ["https://en.wikipedia.org/wiki/Technology"]},
        "contentDetails": {"relatedPlaylists": {"uploads": format!("UU{}", id)}}
    })
}

async fn channels(
    State(state): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing or bad token").into_response();
    }
    state.channel_requests.fetch_add(1, Ordering::SeqCst);

    let ids: Vec<&str> = q
        .get("id")
        .map(|s| s.split(',').filter(|id| !state.missing.contains(*id)).collect())
        .unwrap_or_default();
    let start: usize = q
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    if start == 0 {
        if let Some(param) = q.get("id") {
            state.channel_id_params.lock().unwrap().push(param.clone());
        }
    }

    let per_page = if state.channel_page_items == 0 {
        ids.len().max(1)
    } else {
        state.channel_page_items
    };
    let end = (start + per_page).min(ids.len());
    let items: Vec<_> = ids[start.min(end)..end].iter().map(|id| channel_json(id)).collect();

    let mut body = json!({"kind": "youtube#channelListResponse", "items": items});
    if end < ids.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    Json(body).into_response()
}

async fn subscriptions(
    State(state): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing or bad token").into_response();
    }
    if q.get("mine").map(String::as_str) != Some("true") {
        return (StatusCode::BAD_REQUEST, "mine=true required").into_response();
    }

    let index: usize = q
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let items: Vec<_> = state
        .subscription_pages
        .get(index)
        .map(|page| {
            page.iter()
                .map(|id| json!({"snippet": {"title": id, "resourceId": {"kind": "youtube#channel", "channelId": id}}}))
                .collect()
        })
        .unwrap_or_default();

    let mut body = json!({"items": items});
    if index + 1 < state.subscription_pages.len() {
        body["nextPageToken"] = json!((index + 1).to_string());
    }
    Json(body).into_response()
}

/// Serve `upstream` on an ephemeral localhost port; returns the base URL.
pub async fn spawn(upstream: Upstream) -> (String, Arc<Upstream>) {
    let state = Arc::new(upstream);
    let app = Router::new()
        .route("/channels", get(channels))
        .route("/subscriptions", get(subscriptions))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}
