use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ApiErrorBody;

#[derive(Error, Debug)]
pub enum TilerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Request failed with status {status}{}", .body.as_ref().map(|b| format!(": {b}")).unwrap_or_default())]
    Request {
        status: u16,
        body: Option<ErrorBody>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gave up waiting for {what} after {attempts} polls")]
    PollTimeout { what: String, attempts: u32 },

    #[error("Cancelled")]
    Cancelled,
}

impl TilerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TilerError::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code of a rejected request, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TilerError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error payload returned alongside a non-success status.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Parsed(ApiErrorBody),
    Raw(String),
}

impl ErrorBody {
    /// Parses the service's `{code, message}` shape, keeping the raw text otherwise.
    pub fn from_text(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<ApiErrorBody>(trimmed) {
            Ok(parsed) => Some(ErrorBody::Parsed(parsed)),
            Err(_) => Some(ErrorBody::Raw(trimmed.to_string())),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Parsed(body) => match (&body.code, &body.message) {
                (Some(code), Some(message)) => write!(f, "{code}: {message}"),
                (None, Some(message)) => write!(f, "{message}"),
                (Some(code), None) => write!(f, "{code}"),
                (None, None) => write!(f, "(empty error body)"),
            },
            ErrorBody::Raw(text) => write!(f, "{text}"),
        }
    }
}

/// A single file's upload failure. Recorded in the upload report, never propagated.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage rejected upload: {0}")]
    Storage(String),
}
