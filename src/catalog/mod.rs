//! Catalog records and the store interface the pipeline writes through.

mod language;
mod memory;

pub use language::{Language, resolve_language_code};
pub use memory::InMemoryCatalog;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::book::{BookMetadata, Identifier};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::storage::StoredFile;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Primary key of a [`CatalogRecord`], assigned on creation.
    RecordId
);
entity_id!(LanguageId);
entity_id!(AuthorId);
entity_id!(PublisherId);

/// Publication state given to records created without an explicit one.
pub const DEFAULT_STATUS: &str = "Published";

/// Fields of a record about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub content_hash: ContentHash,
    pub original_path: PathBuf,
    pub status: String,
    pub stored_file: StoredFile,
    pub title: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    pub rights: Option<String>,
    pub summary: Option<String>,
    pub language: Option<LanguageId>,
    pub identifier: Option<Identifier>,
}

impl NewRecord {
    /// Copy the scalar Dublin Core fields of `metadata` into a new record.
    ///
    /// Collections (authors, publishers, subjects) and the cover are attached
    /// after creation, since they need the record's id.
    pub fn from_metadata(
        metadata: &BookMetadata,
        content_hash: ContentHash,
        original_path: PathBuf,
        stored_file: StoredFile,
    ) -> Self {
        Self {
            content_hash,
            original_path,
            status: DEFAULT_STATUS.to_string(),
            stored_file,
            title: metadata.title.clone(),
            date: metadata.date.clone(),
            source: metadata.source.clone(),
            rights: metadata.rights.clone(),
            summary: metadata.summary.clone(),
            language: None,
            identifier: metadata.identifier.clone(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_language(mut self, language: Option<LanguageId>) -> Self {
        self.language = language;
        self
    }
}

/// A persisted catalog entry.
///
/// `content_hash` is unique across the catalog; `original_path` is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: RecordId,
    pub content_hash: ContentHash,
    pub original_path: PathBuf,
    pub status: String,
    pub stored_file: StoredFile,
    pub title: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    pub rights: Option<String>,
    pub summary: Option<String>,
    pub language: Option<LanguageId>,
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub cover: Option<StoredFile>,
    #[serde(default)]
    pub authors: Vec<AuthorId>,
    #[serde(default)]
    pub publishers: Vec<PublisherId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub downloads: u64,
}

impl CatalogRecord {
    pub fn new(id: RecordId, record: NewRecord) -> Self {
        Self {
            id,
            content_hash: record.content_hash,
            original_path: record.original_path,
            status: record.status,
            stored_file: record.stored_file,
            title: record.title,
            date: record.date,
            source: record.source,
            rights: record.rights,
            summary: record.summary,
            language: record.language,
            identifier: record.identifier,
            cover: None,
            authors: Vec::new(),
            publishers: Vec::new(),
            tags: Vec::new(),
            downloads: 0,
        }
    }
}

impl fmt::Display for CatalogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.id, self.title.as_deref().unwrap_or("untitled"))
    }
}

/// Persistence collaborator for catalog records and their associations.
pub trait CatalogStore {
    /// Persist a new record. Fails with
    /// [`Error::DuplicateContentHash`](crate::Error::DuplicateContentHash)
    /// when a record with the same hash exists.
    fn create(&mut self, record: NewRecord) -> Result<RecordId>;

    fn get(&self, id: RecordId) -> Result<Option<CatalogRecord>>;

    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<CatalogRecord>>;

    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogRecord>>;

    /// Replace the stored fields of an existing record.
    fn update(&mut self, record: &CatalogRecord) -> Result<()>;

    /// Fails with [`Error::UnresolvedLanguageCode`](crate::Error::UnresolvedLanguageCode)
    /// when `code` is not a recognisable language code.
    fn get_or_create_language(&mut self, code: &str) -> Result<LanguageId>;

    fn get_or_create_author(&mut self, name: &str) -> Result<AuthorId>;

    fn get_or_create_publisher(&mut self, name: &str) -> Result<PublisherId>;

    fn add_author(&mut self, record: RecordId, author: AuthorId) -> Result<()>;

    fn add_publisher(&mut self, record: RecordId, publisher: PublisherId) -> Result<()>;

    fn add_tag(&mut self, record: RecordId, tag: &str) -> Result<()>;

    /// Associate a stored cover image with a record.
    fn set_cover(&mut self, record: RecordId, cover: StoredFile) -> Result<()>;

    /// Bump the download counter, returning its new value.
    fn record_download(&mut self, record: RecordId) -> Result<u64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
