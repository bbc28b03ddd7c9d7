//! Cesium ion REST client.
//!
//! Every request carries the bearer token as a default header; any non-2xx
//! status becomes [`TilerError::Request`] with the original status code.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::config::TilerConfig;
use crate::error::{ErrorBody, TilerError};
use crate::models::{
    Archive, ArchiveId, AssetId, AssetMetadata, CreatedAsset, NewArchive, NewAsset,
};

/// Archive content as it arrives over the wire.
pub type ByteStream = BoxStream<'static, Result<Bytes, TilerError>>;

/// Operations the pipeline needs from the tiling service.
#[async_trait]
pub trait TilingApi: Send + Sync {
    /// Create an asset and receive its upload credentials.
    async fn create_asset(&self, asset: &NewAsset) -> Result<CreatedAsset, TilerError>;

    /// Tell the service all source files are in place.
    async fn notify_upload_complete(&self, asset_id: AssetId) -> Result<(), TilerError>;

    async fn get_asset(&self, asset_id: AssetId) -> Result<AssetMetadata, TilerError>;

    /// Request a full ZIP archive of one asset.
    async fn create_archive(&self, asset_id: AssetId) -> Result<Archive, TilerError>;

    async fn get_archive(&self, archive_id: ArchiveId) -> Result<Archive, TilerError>;

    async fn download_archive(&self, archive_id: ArchiveId) -> Result<ByteStream, TilerError>;
}

pub struct CesiumIonClient {
    http: reqwest::Client,
    base_url: String,
}

impl CesiumIonClient {
    /// Builds a client from run configuration. Fails before any network
    /// activity when the token is missing or not a valid header value.
    pub fn new(config: &TilerConfig) -> Result<Self, TilerError> {
        config.validate()?;

        let mut token = HeaderValue::from_str(&format!("Bearer {}", config.auth_token))
            .map_err(|_| {
                TilerError::Configuration("auth token contains invalid characters".to_string())
            })?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and turns non-success statuses into `TilerError::Request`.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TilerError> {
        let resp = request.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::debug!("Request rejected with {}: {}", status, text);
            return Err(TilerError::Request {
                status: status.as_u16(),
                body: ErrorBody::from_text(&text),
            });
        }

        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, TilerError> {
        let resp = self.send(request).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TilerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TilingApi for CesiumIonClient {
    async fn create_asset(&self, asset: &NewAsset) -> Result<CreatedAsset, TilerError> {
        self.json(self.http.post(self.url("/assets")).json(asset))
            .await
    }

    async fn notify_upload_complete(&self, asset_id: AssetId) -> Result<(), TilerError> {
        self.send(
            self.http
                .post(self.url(&format!("/assets/{asset_id}/uploadComplete"))),
        )
        .await?;
        Ok(())
    }

    async fn get_asset(&self, asset_id: AssetId) -> Result<AssetMetadata, TilerError> {
        self.json(self.http.get(self.url(&format!("/assets/{asset_id}"))))
            .await
    }

    async fn create_archive(&self, asset_id: AssetId) -> Result<Archive, TilerError> {
        let body = NewArchive::full_zip(asset_id);
        self.json(self.http.post(self.url("/archives")).json(&body))
            .await
    }

    async fn get_archive(&self, archive_id: ArchiveId) -> Result<Archive, TilerError> {
        self.json(self.http.get(self.url(&format!("/archives/{archive_id}"))))
            .await
    }

    async fn download_archive(&self, archive_id: ArchiveId) -> Result<ByteStream, TilerError> {
        let resp = self
            .send(
                self.http
                    .get(self.url(&format!("/archives/{archive_id}/download"))),
            )
            .await?;

        Ok(resp.bytes_stream().map(|chunk| chunk.map_err(TilerError::from)).boxed())
    }
}
