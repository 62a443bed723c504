use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/efahsl/scrap-tv-feed/refs/heads/main/catalog-fullUrls-720p.json";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub feed_url: String,
    pub user_agent: String,
    pub fetch_timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// One entry of the catalog feed. `id` and `title` are required; everything
/// else decodes leniently so a partially-filled feed entry still browses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub images: ItemImages,
    #[serde(default)]
    pub sources: Vec<PlaybackSource>,
}

impl CatalogItem {
    /// First playable source, if the feed provided any.
    pub fn primary_source(&self) -> Option<&PlaybackSource> {
        self.sources.iter().find(|source| !source.url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemImages {
    #[serde(default, rename = "thumbnail_450x253")]
    pub thumbnail: String,
    #[serde(default, rename = "poster_16x9")]
    pub poster: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Result of one catalog fetch: the items that decoded, plus a note per
/// feed entry that did not.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub items: Vec<CatalogItem>,
    pub anomalies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    user_agent: String,
    feed_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("catalog client user agent required");
        }
        let feed_url = if config.feed_url.trim().is_empty() {
            DEFAULT_FEED_URL.to_string()
        } else {
            config.feed_url
        };
        Url::parse(&feed_url).with_context(|| format!("invalid catalog feed url {feed_url}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.fetch_timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            feed_url,
        })
    }

    pub fn fetch(&self) -> Result<Snapshot> {
        let feed: Feed = self
            .http
            .get(&self.feed_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .context("fetch catalog feed")?
            .error_for_status()
            .context("catalog feed request")?
            .json()
            .context("decode catalog feed")?;

        Ok(decode_items(feed.items))
    }
}

/// Decodes feed entries one at a time so a single malformed entry drops out
/// of row membership instead of failing the whole fetch.
fn decode_items(raw: Vec<serde_json::Value>) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<CatalogItem>(value) {
            Ok(item) => snapshot.items.push(item),
            Err(err) => snapshot
                .anomalies
                .push(format!("catalog item {index} dropped: {err}")),
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_feed_entries() {
        let snapshot = decode_items(vec![json!({
            "id": "tears-of-steel",
            "title": "Tears of Steel",
            "description": "A sci-fi short.",
            "category": "Sci-Fi",
            "trending": true,
            "images": {
                "thumbnail_450x253": "https://cdn.test/thumb.jpg",
                "poster_16x9": "https://cdn.test/poster.jpg"
            },
            "sources": [{"type": "mp4", "url": "https://cdn.test/tears.mp4"}]
        })]);
        assert!(snapshot.anomalies.is_empty());
        let item = &snapshot.items[0];
        assert_eq!(item.id, "tears-of-steel");
        assert!(item.trending);
        assert_eq!(item.images.poster, "https://cdn.test/poster.jpg");
        assert_eq!(item.primary_source().unwrap().url, "https://cdn.test/tears.mp4");
    }

    #[test]
    fn drops_malformed_entries_with_anomaly() {
        let snapshot = decode_items(vec![
            json!({"id": "ok", "title": "Ok", "category": "Action"}),
            json!({"title": "missing id", "category": "Action"}),
            json!("not even an object"),
        ]);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.anomalies.len(), 2);
        assert!(snapshot.anomalies[0].contains("item 1"));
    }

    #[test]
    fn optional_fields_default() {
        let snapshot = decode_items(vec![json!({
            "id": "bare",
            "title": "Bare",
            "category": "Drama"
        })]);
        let item = &snapshot.items[0];
        assert!(!item.trending);
        assert!(item.sources.is_empty());
        assert!(item.primary_source().is_none());
    }

    #[test]
    fn blank_source_urls_are_not_playable() {
        let snapshot = decode_items(vec![json!({
            "id": "blank",
            "title": "Blank",
            "category": "Drama",
            "sources": [{"type": "mp4", "url": "   "}]
        })]);
        assert!(snapshot.items[0].primary_source().is_none());
    }

    #[test]
    fn client_rejects_blank_user_agent() {
        let err = Client::new(ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("user agent"));
    }
}
