use anyhow::{Context, Result};
use std::sync::Arc;

use crate::catalog::{self, CatalogItem, ItemImages, PlaybackSource, Snapshot};

pub trait CatalogService: Send + Sync {
    fn fetch_catalog(&self) -> Result<Snapshot>;
}

pub struct HttpCatalogService {
    client: Arc<catalog::Client>,
}

impl HttpCatalogService {
    pub fn new(client: Arc<catalog::Client>) -> Self {
        Self { client }
    }
}

impl CatalogService for HttpCatalogService {
    fn fetch_catalog(&self) -> Result<Snapshot> {
        self.client.fetch().context("fetch catalog")
    }
}

/// Offline catalog used when no feed is reachable, mirroring the sample
/// titles the public demo feed serves.
#[derive(Default)]
pub struct MockCatalogService;

impl CatalogService for MockCatalogService {
    fn fetch_catalog(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            items: vec![
                sample_item("big-buck-bunny", "Big Buck Bunny", "Animation", true),
                sample_item("elephants-dream", "Elephants Dream", "Animation", false),
                sample_item("tears-of-steel", "Tears of Steel", "Sci-Fi", true),
                sample_item("sintel", "Sintel", "Fantasy", false),
            ],
            anomalies: Vec::new(),
        })
    }
}

fn sample_item(id: &str, title: &str, category: &str, trending: bool) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("{title} — an open movie sample."),
        category: category.to_string(),
        trending,
        images: ItemImages::default(),
        sources: vec![PlaybackSource {
            kind: "mp4".to_string(),
            url: format!("https://test-streams.invalid/{id}.mp4"),
        }],
    }
}
