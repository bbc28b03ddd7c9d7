use crate::models::UploadLocation;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::info;

/// Builds an S3 client from the session credentials returned with a new asset.
/// The client lives only as long as the upload step that owns it.
pub async fn setup_storage(
    location: &UploadLocation,
    region: &str,
    endpoint: Option<&str>,
) -> S3ObjectStore {
    info!(
        "☁️  Upload storage: bucket {} ({})",
        location.bucket,
        endpoint.unwrap_or(region)
    );

    let credentials = Credentials::new(
        location.access_key.clone(),
        location.secret_access_key.clone(),
        Some(location.session_token.clone()),
        None,
        "cesium-upload-location",
    );

    let mut loader = aws_config::from_env()
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials);
    if let Some(endpoint) = endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    S3ObjectStore::new(s3_client, location.bucket.clone())
}
