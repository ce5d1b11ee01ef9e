use crate::error::{PersistenceError, SampleError};
use crate::events::{EventCallback, SampleEvent};
use crate::progress::SampledPhotoSet;
use crate::sampler::RandomSampler;
use mugsampler_scanner::{BlobStore, Page, PageFetcher};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Tally for one leaf page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectResult {
    pub newly_uploaded: usize,
    /// Matching images not yet in the sampled set.
    pub candidates: usize,
    pub already_stored: usize,
    pub failed: usize,
}

enum PhotoOutcome {
    Uploaded,
    AlreadyStored,
}

/// Object key for an image: the last path segment of its URL.
pub fn object_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Uploads a random sample of unseen images from a leaf page.
pub struct PhotoCollector {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn BlobStore>,
    photos: SampledPhotoSet,
    sampler: RandomSampler,
    image_pattern: Regex,
    event_callback: Option<EventCallback>,
}

impl PhotoCollector {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn BlobStore>,
        photos: SampledPhotoSet,
        sampler: RandomSampler,
        image_pattern: Regex,
    ) -> Self {
        Self {
            fetcher,
            store,
            photos,
            sampler,
            image_pattern,
            event_callback: None,
        }
    }

    pub(crate) fn set_event_callback(&mut self, callback: EventCallback) {
        self.event_callback = Some(callback);
    }

    pub fn photos(&self) -> &SampledPhotoSet {
        &self.photos
    }

    /// Load `page_url` and collect from it. A page that cannot be loaded
    /// yields nothing; only persistence failures are returned.
    pub async fn collect(
        &mut self,
        page_url: &str,
        max_photos: usize,
    ) -> Result<CollectResult, PersistenceError> {
        info!("Scraping photos from page: {}", page_url);
        match self.fetcher.navigate(page_url).await {
            Ok(page) => self.collect_page(&page, max_photos).await,
            Err(e) => {
                warn!(url = page_url, error = %e, "Error accessing page. Skipping...");
                Ok(CollectResult::default())
            }
        }
    }

    /// Collect from a page that has already been fetched.
    pub async fn collect_page(
        &mut self,
        page: &Page,
        max_photos: usize,
    ) -> Result<CollectResult, PersistenceError> {
        let unsampled: Vec<String> = page
            .images()
            .into_iter()
            .filter(|src| self.image_pattern.is_match(src))
            .filter(|src| !self.photos.contains(src))
            .collect();

        let selected = self.sampler.sample(&unsampled, max_photos);
        info!(
            page = %page.url(),
            "Selected {} new photos for sampling.",
            selected.len()
        );

        let mut result = CollectResult {
            candidates: unsampled.len(),
            ..CollectResult::default()
        };

        for image_url in &selected {
            match self.collect_photo(image_url).await {
                Ok(PhotoOutcome::Uploaded) => result.newly_uploaded += 1,
                Ok(PhotoOutcome::AlreadyStored) => result.already_stored += 1,
                Err(SampleError::Persistence(e)) => return Err(e),
                Err(e) => {
                    warn!(url = %image_url, error = %e, "Error uploading photo");
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    async fn collect_photo(&mut self, image_url: &str) -> Result<PhotoOutcome, SampleError> {
        let key = object_key(image_url).ok_or_else(|| SampleError::Extraction {
            url: image_url.to_string(),
            reason: "no file name in URL path".to_string(),
        })?;

        let exists = self
            .store
            .exists(&key)
            .await
            .map_err(|source| SampleError::Store {
                key: key.clone(),
                source,
            })?;
        if exists {
            info!("Skipped {}, already exists.", key);
            return Ok(PhotoOutcome::AlreadyStored);
        }

        let bytes = self
            .fetcher
            .fetch_bytes(image_url)
            .await
            .map_err(|source| SampleError::Navigation {
                url: image_url.to_string(),
                source,
            })?;
        debug!(url = image_url, size = bytes.len(), "downloaded photo");

        self.store
            .store(&key, bytes, IMAGE_CONTENT_TYPE)
            .await
            .map_err(|source| SampleError::Store {
                key: key.clone(),
                source,
            })?;
        info!("Uploaded {} to bucket.", key);

        // Only recorded once the object is durably stored
        self.photos.insert(image_url)?;

        if let Some(ref callback) = self.event_callback {
            callback(SampleEvent::PhotoUploaded {
                url: image_url.to_string(),
                key,
            });
        }
        Ok(PhotoOutcome::Uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_is_last_segment() {
        assert_eq!(
            object_key("https://mugshots.com/img/2024/mugshot-jane.jpg"),
            Some("mugshot-jane.jpg".to_string())
        );
        assert_eq!(
            object_key("https://mugshots.com/img/mugshot-1.jpg?size=large#x"),
            Some("mugshot-1.jpg".to_string())
        );
    }

    #[test]
    fn test_object_key_rejects_directories() {
        assert_eq!(object_key("https://mugshots.com/img/"), None);
        assert_eq!(object_key("https://mugshots.com"), None);
        assert_eq!(object_key("not a url"), None);
    }
}
