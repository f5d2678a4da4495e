//! HTTP client for the upstream channel and subscription endpoints.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | subscriptions | `GET {base}/subscriptions?part=snippet&mine=true&maxResults=50` |
//! | channels | `GET {base}/channels?part=...&id=a,b,c&maxResults=N` |
//!
//! Both are paginated with `pageToken` / `nextPageToken`. Every request is
//! authorized with a bearer token from a
//! [`CredentialProvider`](crate::credentials::CredentialProvider) and bounded
//! by the configured timeout. Non-2xx responses are returned as errors; there
//! are no retries.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::credentials::CredentialProvider;
use crate::fetch::{BatchSource, Page};
use crate::models::{ChannelRecord, SubscriptionRecord};
use crate::sources::SubscriptionSource;

/// Channel resource parts requested for every lookup.
const CHANNEL_PARTS: &str = "snippet,brandingSettings,statistics,topicDetails,contentDetails";

/// Page size of the subscription listing (the endpoint maximum).
const SUBSCRIPTION_PAGE_SIZE: usize = 50;

/// List envelope shared by both endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(r: ListResponse<T>) -> Self {
        Page {
            items: r.items,
            next_page_token: r.next_page_token,
        }
    }
}

/// Authenticated client for the upstream API.
pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl YouTubeClient {
    /// Build a client, resolving the access token up front so a credential
    /// failure aborts before any work starts.
    pub fn new(api: &ApiConfig, credentials: &dyn CredentialProvider) -> Result<Self> {
        let token = credentials
            .access_token()
            .context("Failed to obtain API credentials")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<ListResponse<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("API error {} from {}: {}", status, endpoint, body_text);
        }

        response
            .json::<ListResponse<T>>()
            .await
            .with_context(|| format!("Failed to decode {} response", endpoint))
    }
}

#[async_trait]
impl BatchSource for YouTubeClient {
    type Record = ChannelRecord;

    fn kind(&self) -> &str {
        "channels"
    }

    async fn fetch_page(
        &self,
        ids: &[String],
        page_token: Option<&str>,
    ) -> Result<Page<ChannelRecord>> {
        let mut query = vec![
            ("part", CHANNEL_PARTS.to_string()),
            ("id", ids.join(",")),
            ("maxResults", ids.len().max(1).to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        Ok(self.get_list("channels", &query).await?.into())
    }
}

#[async_trait]
impl SubscriptionSource for YouTubeClient {
    async fn subscriptions_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<Page<SubscriptionRecord>> {
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("mine", "true".to_string()),
            ("maxResults", SUBSCRIPTION_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        Ok(self.get_list("subscriptions", &query).await?.into())
    }
}
