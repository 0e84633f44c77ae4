use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{
    AuthorId, CatalogRecord, CatalogStore, Language, LanguageId, NewRecord, PublisherId, RecordId,
    resolve_language_code,
};
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::storage::StoredFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Named<Id> {
    id: Id,
    name: String,
}

/// A [`CatalogStore`] held in memory and saved as a single JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryCatalog {
    next_record_id: u64,
    records: Vec<CatalogRecord>,
    languages: Vec<Language>,
    authors: Vec<Named<AuthorId>>,
    publishers: Vec<Named<PublisherId>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog saved with [`InMemoryCatalog::save`]; a missing file
    /// yields an empty catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("catalog {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let data = fs::read(path)?;
        let catalog: Self = serde_json::from_slice(&data)?;
        debug!("loaded {} records from {}", catalog.records.len(), path.display());
        Ok(catalog)
    }

    /// Write the catalog atomically: a temporary file in the same directory
    /// is renamed over `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, self)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        debug!("saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn language(&self, id: LanguageId) -> Option<&Language> {
        self.languages.iter().find(|l| l.id == id)
    }

    pub fn author_name(&self, id: AuthorId) -> Option<&str> {
        self.authors.iter().find(|a| a.id == id).map(|a| a.name.as_str())
    }

    pub fn publisher_name(&self, id: PublisherId) -> Option<&str> {
        self.publishers.iter().find(|p| p.id == id).map(|p| p.name.as_str())
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut CatalogRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::RecordNotFound(id))
    }
}

impl CatalogStore for InMemoryCatalog {
    fn create(&mut self, record: NewRecord) -> Result<RecordId> {
        if self.records.iter().any(|r| r.content_hash == record.content_hash) {
            return Err(Error::DuplicateContentHash(record.content_hash.to_string()));
        }
        self.next_record_id += 1;
        let id = RecordId(self.next_record_id);
        self.records.push(CatalogRecord::new(id, record));
        Ok(id)
    }

    fn get(&self, id: RecordId) -> Result<Option<CatalogRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<CatalogRecord>> {
        Ok(self.records.iter().find(|r| &r.content_hash == hash).cloned())
    }

    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogRecord>> {
        Ok(self.records.iter().find(|r| r.original_path == path).cloned())
    }

    fn update(&mut self, record: &CatalogRecord) -> Result<()> {
        if self
            .records
            .iter()
            .any(|r| r.id != record.id && r.content_hash == record.content_hash)
        {
            return Err(Error::DuplicateContentHash(record.content_hash.to_string()));
        }
        *self.record_mut(record.id)? = record.clone();
        Ok(())
    }

    fn get_or_create_language(&mut self, code: &str) -> Result<LanguageId> {
        let (code, name) = resolve_language_code(code)?;
        if let Some(language) = self.languages.iter().find(|l| l.code == code) {
            return Ok(language.id);
        }
        let id = LanguageId(self.languages.len() as u64 + 1);
        self.languages.push(Language { id, code, name });
        Ok(id)
    }

    fn get_or_create_author(&mut self, name: &str) -> Result<AuthorId> {
        if let Some(author) = self.authors.iter().find(|a| a.name == name) {
            return Ok(author.id);
        }
        let id = AuthorId(self.authors.len() as u64 + 1);
        self.authors.push(Named {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn get_or_create_publisher(&mut self, name: &str) -> Result<PublisherId> {
        if let Some(publisher) = self.publishers.iter().find(|p| p.name == name) {
            return Ok(publisher.id);
        }
        let id = PublisherId(self.publishers.len() as u64 + 1);
        self.publishers.push(Named {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn add_author(&mut self, record: RecordId, author: AuthorId) -> Result<()> {
        let record = self.record_mut(record)?;
        if !record.authors.contains(&author) {
            record.authors.push(author);
        }
        Ok(())
    }

    fn add_publisher(&mut self, record: RecordId, publisher: PublisherId) -> Result<()> {
        let record = self.record_mut(record)?;
        if !record.publishers.contains(&publisher) {
            record.publishers.push(publisher);
        }
        Ok(())
    }

    fn add_tag(&mut self, record: RecordId, tag: &str) -> Result<()> {
        let record = self.record_mut(record)?;
        if !record.tags.iter().any(|t| t == tag) {
            record.tags.push(tag.to_string());
        }
        Ok(())
    }

    fn set_cover(&mut self, record: RecordId, cover: StoredFile) -> Result<()> {
        self.record_mut(record)?.cover = Some(cover);
        Ok(())
    }

    fn record_download(&mut self, record: RecordId) -> Result<u64> {
        let record = self.record_mut(record)?;
        record.downloads += 1;
        Ok(record.downloads)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
