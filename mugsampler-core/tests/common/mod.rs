// Shared fixtures: an in-memory site and blob store

#![allow(dead_code)]

use async_trait::async_trait;
use mugsampler_core::{
    PhotoCollector, ProgressStore, RandomSampler, SampledPhotoSet, SiteLayout, StateBackend,
    TreeWalker,
};
use mugsampler_scanner::{BlobStore, Page, PageFetcher, ScanError, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const ROOT: &str = "https://records.example.com/US-States/";

pub fn state_url(state: &str) -> String {
    format!("{}{}/", ROOT, state)
}

pub fn county_url(state: &str, county: &str) -> String {
    format!("{}{}/{}/", ROOT, state, county)
}

pub fn filter_url(county: &str, letter: char) -> String {
    format!("{}?letter={}", county, letter)
}

pub fn image_url(tag: &str, n: usize) -> String {
    format!("https://img.example.com/photos/mugshot-{}-{}.jpg", tag, n)
}

pub fn image_urls(tag: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| image_url(tag, n)).collect()
}

pub fn listing_html(hrefs: &[String]) -> String {
    let items: String = hrefs
        .iter()
        .map(|h| format!(r#"<li><a href="{}">{}</a></li>"#, h, h))
        .collect();
    format!(
        r#"<html><body><div id="subcategories"><div class="column"><ul class="categories">{}</ul></div></div></body></html>"#,
        items
    )
}

pub fn alphabet_html(filters: &[String]) -> String {
    let links: String = filters
        .iter()
        .map(|f| format!(r#"<a href="{}">{}</a>"#, f, f))
        .collect();
    format!(
        r#"<html><body><nav id="alphabet">{}</nav><img src="https://img.example.com/photos/mugshot-county-banner.jpg"></body></html>"#,
        links
    )
}

pub fn photo_html(images: &[String]) -> String {
    let imgs: String = images
        .iter()
        .map(|src| format!(r#"<img src="{}">"#, src))
        .collect();
    format!(
        r#"<html><body><img src="https://cdn.example.com/static/logo.png">{}</body></html>"#,
        imgs
    )
}

/// Canned pages keyed by URL. Unknown pages answer 404.
#[derive(Default)]
pub struct StaticSite {
    states: Vec<String>,
    pages: HashMap<String, String>,
    broken_images: HashSet<String>,
    visits: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn broken_image(mut self, url: impl Into<String>) -> Self {
        self.broken_images.insert(url.into());
        self
    }

    /// Add `state` to the root listing, with its own listing of counties.
    /// Each county is a plain photo page.
    pub fn with_state(mut self, state: &str, counties: &[&str], photos_per_county: usize) -> Self {
        self.states.push(state_url(state));
        let root = listing_html(&self.states);
        self = self.page(ROOT, root);

        let county_urls: Vec<String> = counties.iter().map(|c| county_url(state, c)).collect();
        self = self.page(state_url(state), listing_html(&county_urls));
        for county in counties {
            let tag = format!("{}-{}", state, county);
            self = self.page(
                county_url(state, county),
                photo_html(&image_urls(&tag, photos_per_county)),
            );
        }
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits.lock().unwrap().iter().filter(|v| *v == url).count()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticSite {
    async fn navigate(&self, url: &str) -> Result<Page, ScanError> {
        self.visits.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => Page::parse(url, body.clone()),
            None => Err(ScanError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScanError> {
        self.downloads.lock().unwrap().push(url.to_string());
        if self.broken_images.contains(url) {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

/// Blob store held in memory, with keys that can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn existing(self, key: &str) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), b"earlier".to_vec());
        self
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> HashSet<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn store(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        if self.failing.contains(key) {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: 503,
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Walker over `site` rooted at `ROOT`, with a fixed seed.
pub fn walker(
    site: Arc<StaticSite>,
    store: Arc<MemoryStore>,
    backend: Arc<dyn StateBackend>,
) -> TreeWalker {
    let layout = SiteLayout::default().with_root_url(ROOT);
    let progress = ProgressStore::load(backend.clone()).unwrap();
    let photos = SampledPhotoSet::load(backend).unwrap();
    let mut sampler = RandomSampler::seeded(7);
    let collector = PhotoCollector::new(
        site.clone(),
        store,
        photos,
        sampler.fork(),
        layout.image_pattern().clone(),
    );
    TreeWalker::new(site, progress, collector, sampler, layout)
}
