//! Error types for pathagar operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::RecordId;

/// Errors that can occur while reading ePubs or updating the catalog.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The archive could not be opened or has no usable root OPF reference.
    #[error("unreadable container {}: {reason}", path.display())]
    UnreadableContainer { path: PathBuf, reason: String },

    /// The OPF document is not well-formed or lacks `<metadata>`.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("missing resource in container: {0}")]
    MissingResource(String),

    #[error("a book with content hash {0} already exists")]
    DuplicateContentHash(String),

    #[error("unresolved language code: {0:?}")]
    UnresolvedLanguageCode(String),

    #[error("catalog record #{0} not found")]
    RecordNotFound(RecordId),

    #[error("catalog store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether the error degrades the current item instead of failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MissingResource(_)
                | Error::DuplicateContentHash(_)
                | Error::UnresolvedLanguageCode(_)
        )
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::UnreadableContainer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
