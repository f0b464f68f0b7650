//! Object Metadata Lookup
//!
//! Resolves an [`ObjectUrl`] into a [`DataLocator`] by asking the storage service for the
//! object's size. No object bytes are read here.

use super::locator::{DataLocator, ObjectUrl};
use crate::error::{Error, Result};

use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;

/// Metadata side of an object store.
pub trait ObjectMetadata: Send + Sync {
    /// Returns the size in bytes of the object, or `Error::Storage` if it does not exist.
    fn object_size(&self, url: &ObjectUrl) -> impl Future<Output = Result<u64>> + Send;
}

/// Parses `url` and looks up the object's size.
pub async fn resolve_locator<M: ObjectMetadata>(store: &M, url: &str) -> Result<DataLocator> {
    let object = ObjectUrl::parse(url)?;
    let size = store.object_size(&object).await?;

    tracing::debug!("Resolved {} to {} bytes", object, size);

    Ok(DataLocator::new(object.bucket, object.key, size))
}

/// In-process object catalogue. Used by tests and local runs.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), u64>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, size: u64) {
        self.objects
            .insert((bucket.to_string(), key.to_string()), size);
    }
}

impl ObjectMetadata for InMemoryObjectStore {
    async fn object_size(&self, url: &ObjectUrl) -> Result<u64> {
        self.objects
            .get(&(url.bucket.clone(), url.key.clone()))
            .map(|entry| *entry.value())
            .ok_or_else(|| {
                Error::Storage(format!(
                    "Object key '{}' does not exist in '{}' bucket",
                    url.key, url.bucket
                ))
            })
    }
}

/// S3-compatible endpoint queried with `HEAD <endpoint>/<bucket>/<key>`.
pub struct HttpObjectStore {
    endpoint: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn object_endpoint(&self, url: &ObjectUrl) -> String {
        format!("{}/{}/{}", self.endpoint, url.bucket, url.key)
    }
}

impl ObjectMetadata for HttpObjectStore {
    async fn object_size(&self, url: &ObjectUrl) -> Result<u64> {
        let response = self
            .http_client
            .head(self.object_endpoint(url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("HEAD {} failed: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Storage(format!(
                "Object key '{}' does not exist in '{}' bucket",
                url.key, url.bucket
            )));
        }
        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "HEAD {} returned {}",
                url,
                response.status()
            )));
        }

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or_else(|| Error::Storage(format!("HEAD {} carried no Content-Length", url)))
    }
}
