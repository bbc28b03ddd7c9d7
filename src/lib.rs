pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;

use crate::config::TilerConfig;
use crate::error::TilerError;
use crate::services::cesium_api::CesiumIonClient;
use crate::services::pipeline::TilingPipeline;
use crate::services::storage::S3ObjectStoreFactory;
use std::sync::Arc;

/// Wires the Cesium ion client and S3 uploads into a pipeline.
/// Fails before any network call when the configuration is unusable.
pub fn create_pipeline(config: &TilerConfig) -> Result<TilingPipeline, TilerError> {
    let api = CesiumIonClient::new(config)?;
    let storage = S3ObjectStoreFactory::new(
        config.upload_region.clone(),
        config.upload_endpoint.clone(),
    );
    Ok(TilingPipeline::new(
        Arc::new(api),
        Arc::new(storage),
        config.poll.clone(),
    ))
}
