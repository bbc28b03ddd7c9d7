//! End-to-end tiling run: create asset, upload sources, wait for tiling,
//! archive, wait for the archive, download.

use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::error::TilerError;
use crate::models::{ArchiveId, AssetId, CreatedAsset, NewAsset};
use crate::services::cesium_api::{ByteStream, TilingApi};
use crate::services::poller::poll_until;
use crate::services::storage::ObjectStoreFactory;
use crate::services::uploader::{LocalFileSet, UploadReport, upload_file_set};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ScanInput,
    CreateAsset,
    Upload,
    Notify,
    PollAsset,
    CreateArchive,
    PollArchive,
    Download,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::ScanInput => "SCAN_INPUT",
            PipelineStage::CreateAsset => "CREATE_ASSET",
            PipelineStage::Upload => "UPLOAD",
            PipelineStage::Notify => "NOTIFY",
            PipelineStage::PollAsset => "POLL_ASSET",
            PipelineStage::CreateArchive => "CREATE_ARCHIVE",
            PipelineStage::PollArchive => "POLL_ARCHIVE",
            PipelineStage::Download => "DOWNLOAD",
            PipelineStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// A run that stopped at `stage`.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: TilerError,
}

fn failed_at(stage: PipelineStage) -> impl FnOnce(TilerError) -> PipelineError {
    move |source| PipelineError { stage, source }
}

#[derive(Debug, Clone)]
pub struct TilingJob {
    pub name: String,
    pub description: String,
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub asset_id: AssetId,
    pub archive_id: ArchiveId,
    pub uploads: UploadReport,
    pub asset_polls: u32,
    pub archive_polls: u32,
    pub bytes_downloaded: u64,
    pub output_file: PathBuf,
}

pub struct TilingPipeline {
    api: Arc<dyn TilingApi>,
    storage: Arc<dyn ObjectStoreFactory>,
    poll: PollPolicy,
    cancel: CancellationToken,
}

impl TilingPipeline {
    pub fn new(
        api: Arc<dyn TilingApi>,
        storage: Arc<dyn ObjectStoreFactory>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            api,
            storage,
            poll,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops any polling stage in progress.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, job: &TilingJob) -> Result<PipelineReport, PipelineError> {
        info!("📂 Scanning {}", job.input_dir.display());
        let files = LocalFileSet::scan(&job.input_dir)
            .await
            .map_err(failed_at(PipelineStage::ScanInput))?;
        if files.is_empty() {
            warn!("⚠️  No files found in {}", job.input_dir.display());
        }

        info!("🆕 Creating asset \"{}\"", job.name);
        let CreatedAsset {
            asset_metadata,
            upload_location,
            ..
        } = self
            .api
            .create_asset(&NewAsset::tiles(&job.name, &job.description))
            .await
            .map_err(failed_at(PipelineStage::CreateAsset))?;
        let asset_id = asset_metadata.id;
        info!("✅ Asset {} created (status {:?})", asset_id, asset_metadata.status);

        info!(
            "⬆️  Uploading {} file(s) to {} ({} skipped)",
            files.files.len(),
            upload_location.bucket,
            files.skipped.len()
        );
        let uploads = {
            let store = self.storage.connect(&upload_location).await;
            upload_file_set(store.as_ref(), &files, asset_id).await
        };
        // Credentials are only good for this asset's upload.
        drop(upload_location);
        if uploads.failed_count() > 0 {
            warn!(
                "⚠️  {} of {} uploads failed, continuing",
                uploads.failed_count(),
                uploads.attempted()
            );
        }

        info!("📨 Notifying upload complete for asset {}", asset_id);
        self.api
            .notify_upload_complete(asset_id)
            .await
            .map_err(failed_at(PipelineStage::Notify))?;

        info!("⏳ Waiting for asset {} to finish tiling", asset_id);
        let api = &self.api;
        let asset = poll_until(
            &format!("asset {asset_id}"),
            &self.poll,
            &self.cancel,
            || async move {
                let meta = api.get_asset(asset_id).await?;
                if meta.status.is_error() {
                    warn!("Asset {} reports {:?}", asset_id, meta.status);
                } else {
                    debug!(
                        "Asset {} status {:?} ({}%)",
                        asset_id,
                        meta.status,
                        meta.percent_complete.unwrap_or(0)
                    );
                }
                Ok(meta)
            },
            |meta| meta.status.is_complete(),
        )
        .await
        .map_err(failed_at(PipelineStage::PollAsset))?;
        info!("✅ Asset {} complete after {} poll(s)", asset_id, asset.attempts);

        info!("🗜️  Creating archive for asset {}", asset_id);
        let archive = self
            .api
            .create_archive(asset_id)
            .await
            .map_err(failed_at(PipelineStage::CreateArchive))?;
        let archive_id = archive.id;

        info!("⏳ Waiting for archive {}", archive_id);
        let archive = poll_until(
            &format!("archive {archive_id}"),
            &self.poll,
            &self.cancel,
            || async move {
                let archive = api.get_archive(archive_id).await?;
                if archive.status.is_error() {
                    warn!("Archive {} reports {:?}", archive_id, archive.status);
                } else {
                    debug!("Archive {} status {:?}", archive_id, archive.status);
                }
                Ok(archive)
            },
            |archive| archive.status.is_complete(),
        )
        .await
        .map_err(failed_at(PipelineStage::PollArchive))?;
        info!(
            "✅ Archive {} complete after {} poll(s)",
            archive_id, archive.attempts
        );

        info!("⬇️  Downloading archive {} to {}", archive_id, job.output_file.display());
        let stream = self
            .api
            .download_archive(archive_id)
            .await
            .map_err(failed_at(PipelineStage::Download))?;
        let bytes_downloaded = write_stream(stream, &job.output_file)
            .await
            .map_err(failed_at(PipelineStage::Download))?;

        info!(
            "🏁 {}: wrote {} bytes to {}",
            PipelineStage::Done,
            bytes_downloaded,
            job.output_file.display()
        );

        Ok(PipelineReport {
            asset_id,
            archive_id,
            uploads,
            asset_polls: asset.attempts,
            archive_polls: archive.attempts,
            bytes_downloaded,
            output_file: job.output_file.clone(),
        })
    }
}

/// Streams `stream` into a new file at `path`. A partially written file is
/// removed if the stream fails.
async fn write_stream(mut stream: ByteStream, path: &Path) -> Result<u64, TilerError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| TilerError::io(path, e))?;

    let mut written: u64 = 0;
    let result: Result<(), TilerError> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| TilerError::io(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| TilerError::io(path, e))?;
        file.sync_all().await.map_err(|e| TilerError::io(path, e))
    }
    .await;

    if let Err(e) = result {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::CreateAsset.to_string(), "CREATE_ASSET");
        assert_eq!(PipelineStage::PollArchive.to_string(), "POLL_ARCHIVE");
    }

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = failed_at(PipelineStage::Notify)(TilerError::Request {
            status: 502,
            body: None,
        });
        assert_eq!(err.to_string(), "NOTIFY failed: Request failed with status 502");
    }

    #[tokio::test]
    async fn test_write_stream_concatenates_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        let chunks: Vec<Result<Bytes, TilerError>> =
            vec![Ok(Bytes::from_static(b"ZIP")), Ok(Bytes::from_static(b"DATA"))];

        let written = write_stream(stream::iter(chunks).boxed(), &path).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&path).unwrap(), b"ZIPDATA");
    }

    #[tokio::test]
    async fn test_write_stream_removes_partial_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        let chunks: Vec<Result<Bytes, TilerError>> = vec![
            Ok(Bytes::from_static(b"ZIP")),
            Err(TilerError::Decode("connection reset".to_string())),
        ];

        let err = write_stream(stream::iter(chunks).boxed(), &path).await.unwrap_err();

        assert!(matches!(err, TilerError::Decode(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_stream_unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.zip");
        let chunks: Vec<Result<Bytes, TilerError>> = vec![Ok(Bytes::from_static(b"x"))];

        let err = write_stream(stream::iter(chunks).boxed(), &path).await.unwrap_err();
        assert!(matches!(err, TilerError::Io { .. }));
    }
}
