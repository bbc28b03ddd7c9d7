use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

use crate::error::UploadError;
use crate::models::UploadLocation;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `path` under `key`, returning the number of bytes sent.
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, UploadError>;
}

/// Builds an [`ObjectStore`] from the credentials handed out for one asset.
#[async_trait]
pub trait ObjectStoreFactory: Send + Sync {
    async fn connect(&self, location: &UploadLocation) -> Box<dyn ObjectStore>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, UploadError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;

        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .send()
            .await;

        res.map_err(|e| {
            UploadError::Storage(format!(
                "put_object to bucket {} failed: {}",
                self.bucket,
                DisplayErrorContext(&e)
            ))
        })?;
        Ok(size)
    }
}

/// Connects to S3 with per-asset session credentials.
pub struct S3ObjectStoreFactory {
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStoreFactory {
    pub fn new(region: String, endpoint: Option<String>) -> Self {
        Self { region, endpoint }
    }
}

#[async_trait]
impl ObjectStoreFactory for S3ObjectStoreFactory {
    async fn connect(&self, location: &UploadLocation) -> Box<dyn ObjectStore> {
        let store = crate::infrastructure::storage::setup_storage(
            location,
            &self.region,
            self.endpoint.as_deref(),
        )
        .await;
        Box::new(store)
    }
}
