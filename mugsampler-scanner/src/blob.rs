use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

pub const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// Capability to check for and upload objects by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StoreError>;
}

/// Object keys are flat names: no separators, no relative components.
fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Blob store backed by a local directory, one file per key.
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // Write beside the target and rename so a crash never leaves a torn object
        let partial = self.root.join(format!(".{}.part", key));
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, &path).await?;

        debug!(key, content_type, size = bytes.len(), "stored object on disk");
        Ok(())
    }
}

/// Google Cloud Storage bucket accessed through the JSON API.
pub struct GcsBlobStore {
    client: Client,
    base_url: Url,
    bucket: String,
    token: Option<String>,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>, token: Option<String>) -> Result<Self, StoreError> {
        Self::with_base_url(GCS_API_BASE, bucket, token)
    }

    /// Point the store at a different API endpoint, e.g. an emulator.
    pub fn with_base_url(
        base_url: &str,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|_| StoreError::InvalidEndpoint(base_url.to_string()))?;
        let client = Client::builder()
            .user_agent(concat!("mugsampler/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url,
            bucket: bucket.into(),
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let url = self.endpoint(&["storage", "v1", "b", self.bucket.as_str(), "o", key])?;

        let response = self.authorize(self.client.get(url)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut url = self.endpoint(&["upload", "storage", "v1", "b", self.bucket.as_str(), "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let size = bytes.len();
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(key, bucket = %self.bucket, size, "uploaded object");
        Ok(())
    }
}
