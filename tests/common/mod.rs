#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cesium_tiler::config::PollPolicy;
use cesium_tiler::error::{TilerError, UploadError};
use cesium_tiler::models::{
    Archive, ArchiveFormat, ArchiveId, ArchiveStatus, ArchiveType, AssetId, AssetMetadata, AssetStatus, CreatedAsset,
    NewAsset, UploadLocation,
};
use cesium_tiler::services::cesium_api::{ByteStream, TilingApi};
use cesium_tiler::services::pipeline::{TilingJob, TilingPipeline};
use cesium_tiler::services::storage::{ObjectStore, ObjectStoreFactory};
use futures::StreamExt;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Everything the doubles saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateAsset { name: String, description: String },
    Connect { bucket: String, session_token: String },
    Put { key: String, contents: Vec<u8> },
    NotifyUploadComplete(AssetId),
    GetAsset(AssetId),
    CreateArchive(AssetId),
    GetArchive(ArchiveId),
    Download(ArchiveId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CreateAsset,
    Notify,
    GetAsset,
    CreateArchive,
    GetArchive,
    Download,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub struct MockTilingApi {
    pub log: CallLog,
    pub asset_id: AssetId,
    pub archive_id: ArchiveId,
    pub asset_statuses: Mutex<VecDeque<AssetStatus>>,
    pub archive_statuses: Mutex<VecDeque<ArchiveStatus>>,
    pub download: Vec<u8>,
    pub fail: Option<(Endpoint, u16)>,
}

impl MockTilingApi {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            asset_id: 42,
            archive_id: 7,
            asset_statuses: Mutex::new(VecDeque::from(vec![AssetStatus::Complete])),
            archive_statuses: Mutex::new(VecDeque::from(vec![ArchiveStatus::Complete])),
            download: b"ZIPDATA".to_vec(),
            fail: None,
        }
    }

    pub fn with_asset_statuses(self, statuses: Vec<AssetStatus>) -> Self {
        *self.asset_statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_archive_statuses(self, statuses: Vec<ArchiveStatus>) -> Self {
        *self.archive_statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn failing(mut self, endpoint: Endpoint, status: u16) -> Self {
        self.fail = Some((endpoint, status));
        self
    }

    fn check(&self, endpoint: Endpoint) -> Result<(), TilerError> {
        match self.fail {
            Some((failing, status)) if failing == endpoint => Err(TilerError::Request {
                status,
                body: None,
            }),
            _ => Ok(()),
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

/// Pops the next scripted value; the last one repeats once the script runs out.
fn next_scripted<T: Clone>(script: &Mutex<VecDeque<T>>) -> T {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap()
    }
}

fn asset_metadata(id: AssetId, status: AssetStatus) -> AssetMetadata {
    AssetMetadata {
        id,
        name: None,
        description: None,
        asset_type: None,
        status,
        percent_complete: None,
        bytes: None,
        date_added: None,
    }
}

fn archive(id: ArchiveId, asset_id: AssetId, status: ArchiveStatus) -> Archive {
    Archive {
        id,
        status,
        asset_ids: vec![asset_id],
        format: Some(ArchiveFormat::Zip),
        archive_type: Some(ArchiveType::Full),
        bytes_archived: None,
    }
}

#[async_trait]
impl TilingApi for MockTilingApi {
    async fn create_asset(&self, asset: &NewAsset) -> Result<CreatedAsset, TilerError> {
        self.record(Call::CreateAsset {
            name: asset.name.clone(),
            description: asset.description.clone(),
        });
        self.check(Endpoint::CreateAsset)?;
        Ok(CreatedAsset {
            asset_metadata: asset_metadata(self.asset_id, AssetStatus::AwaitingFiles),
            upload_location: UploadLocation {
                bucket: "assets.cesium.com".to_string(),
                prefix: Some(format!("sources/{}/", self.asset_id)),
                access_key: "AK".to_string(),
                secret_access_key: "SK".to_string(),
                session_token: format!("session-for-{}", self.asset_id),
                endpoint: None,
            },
            on_complete: None,
        })
    }

    async fn notify_upload_complete(&self, asset_id: AssetId) -> Result<(), TilerError> {
        self.record(Call::NotifyUploadComplete(asset_id));
        self.check(Endpoint::Notify)
    }

    async fn get_asset(&self, asset_id: AssetId) -> Result<AssetMetadata, TilerError> {
        self.record(Call::GetAsset(asset_id));
        self.check(Endpoint::GetAsset)?;
        Ok(asset_metadata(asset_id, next_scripted(&self.asset_statuses)))
    }

    async fn create_archive(&self, asset_id: AssetId) -> Result<Archive, TilerError> {
        self.record(Call::CreateArchive(asset_id));
        self.check(Endpoint::CreateArchive)?;
        Ok(archive(self.archive_id, asset_id, ArchiveStatus::InProgress))
    }

    async fn get_archive(&self, archive_id: ArchiveId) -> Result<Archive, TilerError> {
        self.record(Call::GetArchive(archive_id));
        self.check(Endpoint::GetArchive)?;
        Ok(archive(
            archive_id,
            self.asset_id,
            next_scripted(&self.archive_statuses),
        ))
    }

    async fn download_archive(&self, archive_id: ArchiveId) -> Result<ByteStream, TilerError> {
        self.record(Call::Download(archive_id));
        self.check(Endpoint::Download)?;
        let chunks: Vec<Result<Bytes, TilerError>> = self
            .download
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

pub struct MockStore {
    log: CallLog,
    fail_files: HashSet<String>,
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, UploadError> {
        let contents = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.log.lock().unwrap().push(Call::Put {
            key: key.to_string(),
            contents: contents.clone(),
        });

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if self.fail_files.contains(&name) {
            return Err(UploadError::Storage("simulated storage outage".to_string()));
        }
        Ok(contents.len() as u64)
    }
}

pub struct MockStoreFactory {
    pub log: CallLog,
    pub fail_files: HashSet<String>,
}

impl MockStoreFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_files: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_files.insert(file_name.to_string());
        self
    }
}

#[async_trait]
impl ObjectStoreFactory for MockStoreFactory {
    async fn connect(&self, location: &UploadLocation) -> Box<dyn ObjectStore> {
        self.log.lock().unwrap().push(Call::Connect {
            bucket: location.bucket.clone(),
            session_token: location.session_token.clone(),
        });
        Box::new(MockStore {
            log: self.log.clone(),
            fail_files: self.fail_files.clone(),
        })
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn pipeline(api: MockTilingApi, storage: MockStoreFactory) -> TilingPipeline {
    TilingPipeline::new(Arc::new(api), Arc::new(storage), PollPolicy::immediate())
}

pub fn job(input_dir: &Path, output_file: &Path) -> TilingJob {
    TilingJob {
        name: "Test".to_string(),
        description: "Test".to_string(),
        input_dir: input_dir.to_path_buf(),
        output_file: output_file.to_path_buf(),
    }
}

pub fn position(log: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    log.iter().position(pred)
}

pub fn last_position(log: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    log.iter().rposition(pred)
}

pub fn put_keys(log: &[Call]) -> Vec<String> {
    log.iter()
        .filter_map(|c| match c {
            Call::Put { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect()
}
