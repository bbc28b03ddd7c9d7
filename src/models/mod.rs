use serde::{Deserialize, Serialize};
use std::fmt;

pub type AssetId = u64;
pub type ArchiveId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(rename = "3DTILES")]
    ThreeDTiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "3D_MODEL")]
    ThreeDModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeometryCompression {
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetOptions {
    pub source_type: SourceType,
    pub geometry_compression: GeometryCompression,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            source_type: SourceType::ThreeDModel,
            geometry_compression: GeometryCompression::None,
        }
    }
}

/// Request body for `POST /assets`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAsset {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub options: AssetOptions,
}

impl NewAsset {
    pub fn tiles(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            asset_type: AssetType::ThreeDTiles,
            options: AssetOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    AwaitingFiles,
    NotStarted,
    InProgress,
    Complete,
    DataError,
    Error,
    #[serde(other)]
    Unknown,
}

impl AssetStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, AssetStatus::Complete)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AssetStatus::DataError | AssetStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub id: AssetId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,
    pub status: AssetStatus,
    /// Processing progress reported by the service, 0-100.
    #[serde(default)]
    pub percent_complete: Option<u8>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub date_added: Option<String>,
}

/// Transient storage credentials scoped to one asset's upload.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLocation {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

// Credentials must never reach the logs.
impl fmt::Debug for UploadLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadLocation")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("access_key", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Completion callback the service advertises; informational only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OnComplete {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// Response of `POST /assets`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAsset {
    pub asset_metadata: AssetMetadata,
    pub upload_location: UploadLocation,
    #[serde(default)]
    pub on_complete: Option<OnComplete>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveFormat {
    Zip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveType {
    Full,
}

/// Request body for `POST /archives`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArchive {
    pub asset_ids: Vec<AssetId>,
    pub format: ArchiveFormat,
    #[serde(rename = "type")]
    pub archive_type: ArchiveType,
}

impl NewArchive {
    pub fn full_zip(asset_id: AssetId) -> Self {
        Self {
            asset_ids: vec![asset_id],
            format: ArchiveFormat::Zip,
            archive_type: ArchiveType::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveStatus {
    InProgress,
    Complete,
    Error,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl ArchiveStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ArchiveStatus::Complete)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ArchiveStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    pub id: ArchiveId,
    pub status: ArchiveStatus,
    #[serde(default)]
    pub asset_ids: Vec<AssetId>,
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
    #[serde(default, rename = "type")]
    pub archive_type: Option<ArchiveType>,
    #[serde(default)]
    pub bytes_archived: Option<u64>,
}

/// Error body returned by the API on non-success statuses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
