mod common;

use anyhow::Result;
use subscription_browser::cache::NullCache;
use subscription_browser::config::ApiConfig;
use subscription_browser::credentials::CredentialProvider;
use subscription_browser::fetch::{fetch_batched, BatchSource};
use subscription_browser::progress::NoProgress;
use subscription_browser::sources::{subscription_channel_ids, SubscriptionSource};
use subscription_browser::youtube::YouTubeClient;

struct StaticToken(&'static str);

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct NoToken;

impl CredentialProvider for NoToken {
    fn access_token(&self) -> Result<String> {
        anyhow::bail!("no token available")
    }
}

fn api(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn channel_lookup_follows_page_tokens() {
    let (base_url, upstream) = common::spawn(common::Upstream {
        channel_page_items: 2,
        ..Default::default()
    })
    .await;
    let client = YouTubeClient::new(&api(&base_url), &StaticToken(common::TOKEN)).unwrap();

    let first = client
        .fetch_page(&ids(&["UC1", "UC2", "UC3"]), None)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.next_page_token.as_deref(), Some("2"));

    let out = fetch_batched(&client, &NullCache, &ids(&["UC1", "UC2", "UC3"]), 50, &NoProgress)
        .await
        .unwrap();
    let got: Vec<&str> = out.records.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(got, vec!["UC1", "UC2", "UC3"]);
    assert_eq!(out.records[0].statistics.subscriber_count, Some(10));
    assert_eq!(
        out.records[0].branding_settings.channel.keywords.as_deref(),
        Some("tech \"daily news\" vlog")
    );
    // one page for the direct call, two for the batched fetch
    assert_eq!(upstream.channel_requests(), 3);
}

#[tokio::test]
async fn subscriptions_listing_is_drained() {
    let (base_url, _upstream) = common::spawn(common::Upstream {
        subscription_pages: vec![ids(&["UCa", "UCb"]), ids(&["UCc"])],
        ..Default::default()
    })
    .await;
    let client = YouTubeClient::new(&api(&base_url), &StaticToken(common::TOKEN)).unwrap();

    let page = client.subscriptions_page(None).await.unwrap();
    assert_eq!(page.items[0].snippet.resource_id.channel_id, "UCa");

    let all = subscription_channel_ids(&client, &NullCache).await.unwrap();
    assert_eq!(all, vec!["UCa", "UCb", "UCc"]);
}

#[tokio::test]
async fn rejected_token_is_an_error() {
    let (base_url, upstream) = common::spawn(common::Upstream::default()).await;
    let client = YouTubeClient::new(&api(&base_url), &StaticToken("expired")).unwrap();

    let err = client.fetch_page(&ids(&["UC1"]), None).await.unwrap_err();
    assert!(err.to_string().contains("401"), "{}", err);
    assert_eq!(upstream.channel_requests(), 0);
}

#[test]
fn credential_failure_stops_client_construction() {
    let err = YouTubeClient::new(&api("http://127.0.0.1:9"), &NoToken)
        .err()
        .unwrap();
    assert!(format!("{:#}", err).contains("no token available"));
}

#[tokio::test]
async fn unreachable_upstream_is_an_error() {
    let client = YouTubeClient::new(&api("http://127.0.0.1:9"), &StaticToken(common::TOKEN)).unwrap();
    assert!(client.fetch_page(&ids(&["UC1"]), None).await.is_err());
}
