use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::error::{TilerError, UploadError};
use crate::models::AssetId;
use crate::services::storage::ObjectStore;

/// Storage key for a source file of an asset.
pub fn source_key(asset_id: AssetId, file_name: &str) -> String {
    format!("sources/{}/{}", asset_id, file_name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub path: PathBuf,
}

/// Regular files found directly inside an input directory.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSet {
    pub files: Vec<LocalFile>,
    /// Entries that were not regular files (directories, links to directories, sockets...).
    pub skipped: Vec<PathBuf>,
}

impl LocalFileSet {
    /// Lists `dir` without recursing. Symlinks are followed to decide whether
    /// the target is a file; anything else is skipped.
    pub async fn scan(dir: &Path) -> Result<Self, TilerError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| TilerError::io(dir, e))?;

        let mut set = LocalFileSet::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TilerError::io(dir, e))?
        {
            let path = entry.path();
            let is_file = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.is_file(),
                Err(e) => {
                    // Dangling symlink or vanished entry
                    warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    false
                }
            };

            if !is_file {
                set.skipped.push(path);
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => set.files.push(LocalFile { name, path }),
                Err(raw) => {
                    warn!("Skipping non UTF-8 file name {:?}", raw);
                    set.skipped.push(path);
                }
            }
        }

        set.files.sort_by(|a, b| a.name.cmp(&b.name));
        set.skipped.sort();
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug)]
pub struct FileUpload {
    pub file_name: String,
    pub key: String,
    pub result: Result<u64, UploadError>,
}

/// Per-file outcome of a best-effort batch upload.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploads: Vec<FileUpload>,
    pub skipped: usize,
}

impl UploadReport {
    pub fn attempted(&self) -> usize {
        self.uploads.len()
    }

    pub fn uploaded(&self) -> usize {
        self.uploads.iter().filter(|u| u.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileUpload> {
        self.uploads.iter().filter(|u| u.result.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.uploads
            .iter()
            .filter_map(|u| u.result.as_ref().ok())
            .sum()
    }
}

/// Uploads every file in `files` under `sources/<asset_id>/`. A failed file is
/// logged and recorded; the remaining files are still attempted.
pub async fn upload_file_set(
    store: &dyn ObjectStore,
    files: &LocalFileSet,
    asset_id: AssetId,
) -> UploadReport {
    let mut report = UploadReport {
        uploads: Vec::with_capacity(files.files.len()),
        skipped: files.skipped.len(),
    };

    for file in &files.files {
        let key = source_key(asset_id, &file.name);
        let result = store.put_file(&key, &file.path).await;

        match &result {
            Ok(bytes) => info!("⬆️  Uploaded {} ({} bytes)", key, bytes),
            Err(e) => error!("❌ Upload of {} failed: {}", file.path.display(), e),
        }

        report.uploads.push(FileUpload {
            file_name: file.name.clone(),
            key,
            result,
        });
    }

    report
}
