//! Importing ePub files into the catalog.
//!
//! [`Importer::import_one`] drives a single file through the pipeline:
//!
//! 1. skip files whose path is already catalogued (optional, before parsing)
//! 2. open the container and parse its OPF metadata
//! 3. extract the cover to a [`TemporaryCoverAsset`] (best effort)
//! 4. hash the file and resolve its language
//! 5. store the book file as a copy or a link, then create the record
//! 6. attach authors, publishers, the cover and subject tags
//!
//! Per-item failures are reported as [`ImportOutcome::Failed`] and never stop
//! a batch. Temporary covers and stored files written for a failed item are
//! removed before the outcome is returned.

mod cover;
pub mod normalize;

pub use cover::TemporaryCoverAsset;

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::book::BookMetadata;
use crate::catalog::{CatalogStore, DEFAULT_STATUS, LanguageId, NewRecord, RecordId};
use crate::epub::EpubContainer;
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::storage::{FileStore, StorageArea, StoredFile};

use normalize::{split_authors, subjects_to_tags};

/// How an imported book file is kept in the file store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StorageStrategy {
    /// Duplicate the bytes into owned storage.
    #[default]
    Copy,
    /// Store a symbolic link to the original file.
    Link,
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageStrategy::Copy => "copy",
            StorageStrategy::Link => "link",
        })
    }
}

impl FromStr for StorageStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "copy" => Ok(StorageStrategy::Copy),
            "link" => Ok(StorageStrategy::Link),
            other => Err(format!("unknown storage strategy {other:?}")),
        }
    }
}

/// Options for an import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub storage: StorageStrategy,
    /// Skip files whose absolute path matches a record's `original_path`.
    pub skip_known_paths: bool,
    /// Publication status given to new records.
    pub status: String,
    /// Where temporary cover assets are written (OS temp dir when `None`).
    pub temp_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            storage: StorageStrategy::Copy,
            skip_known_paths: true,
            status: DEFAULT_STATUS.to_string(),
            temp_dir: None,
        }
    }
}

impl ImportOptions {
    pub fn with_storage(mut self, storage: StorageStrategy) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_skip_known_paths(mut self, skip: bool) -> Self {
        self.skip_known_paths = skip;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

/// Result of importing one file.
#[derive(Debug)]
pub enum ImportOutcome {
    Imported(RecordId),
    /// The path is already catalogued.
    Skipped,
    /// Another record has the same content hash.
    DuplicateSkipped(String),
    Failed(Error),
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, ImportOutcome::Imported(_))
    }
}

/// Counts for a batch import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported + self.duplicates + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Imported(_) => self.imported += 1,
            ImportOutcome::DuplicateSkipped(_) => self.duplicates += 1,
            ImportOutcome::Skipped => self.skipped += 1,
            ImportOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files imported, {} files not imported ({} duplicates, {} skipped, {} failed)",
            self.imported,
            self.total() - self.imported,
            self.duplicates,
            self.skipped,
            self.failed
        )
    }
}

/// Imports ePub files into a catalog, storing their files in a file store.
pub struct Importer<'a> {
    catalog: &'a mut dyn CatalogStore,
    files: &'a mut dyn FileStore,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    pub fn new(
        catalog: &'a mut dyn CatalogStore,
        files: &'a mut dyn FileStore,
        options: ImportOptions,
    ) -> Self {
        Self {
            catalog,
            files,
            options,
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import a single ePub.
    pub fn import_one(&mut self, path: &Path) -> ImportOutcome {
        match self.try_import(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_recoverable() {
                    warn!("{}: {e}", path.display());
                } else {
                    error!("{}: {e}", path.display());
                }
                ImportOutcome::Failed(e)
            }
        }
    }

    /// Import files one at a time; a failing item does not stop the batch.
    pub fn import_many<P: AsRef<Path>>(&mut self, paths: &[P]) -> ImportSummary {
        let total = paths.len();
        let width = total.to_string().len();
        let mut summary = ImportSummary::default();

        info!("importing {total} items");
        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            info!("[{:>width$}/{total}] {}", i + 1, path.display());
            let outcome = self.import_one(path);
            summary.record(&outcome);
        }
        info!("{summary}");
        summary
    }

    fn try_import(&mut self, path: &Path) -> Result<ImportOutcome> {
        let path = std::path::absolute(path)?;

        if self.options.skip_known_paths
            && let Some(existing) = self.catalog.find_by_path(&path)?
        {
            info!("{}: already catalogued as {existing}", path.display());
            return Ok(ImportOutcome::Skipped);
        }

        let mut container = EpubContainer::open(&path)?;
        let metadata = container.metadata()?;
        let cover = self.extract_cover(&mut container, &metadata);
        container.close();

        let content_hash = ContentHash::of_file(&path)?;
        let language = self.resolve_language(&metadata);
        let stored_file = self.store_book(&path)?;

        let record = NewRecord::from_metadata(&metadata, content_hash, path.clone(), stored_file.clone())
            .with_status(self.options.status.clone())
            .with_language(language);

        let id = match self.catalog.create(record) {
            Ok(id) => id,
            Err(Error::DuplicateContentHash(hash)) => {
                self.discard_stored(&stored_file);
                warn!(
                    "{}: not saved, a book with the same content ({hash}) already exists",
                    path.display()
                );
                return Ok(ImportOutcome::DuplicateSkipped(hash));
            }
            Err(e) => {
                self.discard_stored(&stored_file);
                return Err(e);
            }
        };

        self.attach_authors(id, &metadata.creators);
        self.attach_publishers(id, &metadata.publishers);
        if let Some(cover) = cover {
            self.commit_cover(id, cover);
        }
        self.attach_tags(id, &metadata.subjects);

        info!("{}: imported as #{id} ({})", path.display(), metadata.display_title());
        Ok(ImportOutcome::Imported(id))
    }

    /// Extract the referenced cover; any failure means no cover.
    fn extract_cover(
        &self,
        container: &mut EpubContainer,
        metadata: &BookMetadata,
    ) -> Option<TemporaryCoverAsset> {
        let href = metadata.cover_reference.as_deref()?;
        let asset = container.extract_resource(href).and_then(|data| {
            TemporaryCoverAsset::create(self.options.temp_dir.as_deref(), href, &data)
        });
        match asset {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("{}: no cover: {e}", container.path().display());
                None
            }
        }
    }

    fn resolve_language(&mut self, metadata: &BookMetadata) -> Option<LanguageId> {
        let code = metadata.language_code.as_deref()?;
        match self.catalog.get_or_create_language(code) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("language left empty: {e}");
                None
            }
        }
    }

    fn store_book(&mut self, path: &Path) -> Result<StoredFile> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book.epub".to_string());

        match self.options.storage {
            StorageStrategy::Copy => {
                let mut file = File::open(path)?;
                self.files.save_copy(StorageArea::Books, &filename, &mut file)
            }
            StorageStrategy::Link => self.files.save_link(StorageArea::Books, &filename, path),
        }
    }

    fn discard_stored(&mut self, stored: &StoredFile) {
        if let Err(e) = self.files.delete(stored) {
            warn!("could not remove stored file {}: {e}", stored.name);
        }
    }

    fn attach_authors(&mut self, id: RecordId, creators: &[String]) {
        for name in creators.iter().flat_map(|raw| split_authors(raw)) {
            debug!("found author: {name:?}");
            let result = self
                .catalog
                .get_or_create_author(&name)
                .and_then(|author| self.catalog.add_author(id, author));
            if let Err(e) = result {
                warn!("author {name:?} not added: {e}");
            }
        }
    }

    fn attach_publishers(&mut self, id: RecordId, publishers: &[String]) {
        for name in publishers.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            debug!("found publisher: {name:?}");
            let result = self
                .catalog
                .get_or_create_publisher(name)
                .and_then(|publisher| self.catalog.add_publisher(id, publisher));
            if let Err(e) = result {
                warn!("publisher {name:?} not added: {e}");
            }
        }
    }

    fn attach_tags(&mut self, id: RecordId, subjects: &[String]) {
        for tag in subjects_to_tags(subjects) {
            if let Err(e) = self.catalog.add_tag(id, &tag) {
                warn!("tag {tag:?} not added: {e}");
            }
        }
    }

    /// Copy the cover into the store as `<id><ext>` and drop the temporary file.
    fn commit_cover(&mut self, id: RecordId, mut cover: TemporaryCoverAsset) {
        let filename = format!("{id}{}", cover.extension());
        let stored = cover
            .open()
            .and_then(|mut file| self.files.save_copy(StorageArea::Covers, &filename, &mut file));

        match stored {
            Ok(stored) => {
                if let Err(e) = self.catalog.set_cover(id, stored.clone()) {
                    warn!("cover for #{id} not recorded: {e}");
                    self.discard_stored(&stored);
                }
            }
            Err(e) => warn!("error while saving cover image for #{id}: {e}"),
        }

        if let Err(e) = cover.discard() {
            warn!("could not remove temporary cover: {e}");
        }
    }
}

/// Collect the `.epub` files named by `items`, walking directories.
///
/// Paths are made absolute and returned once each, in discovery order. When
/// `catalog` is given, files already recorded under the same path are left out.
pub fn find_epubs<P: AsRef<Path>>(
    items: &[P],
    catalog: Option<&dyn CatalogStore>,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    let mut consider = |path: &Path| -> Result<()> {
        if path.extension().is_none_or(|ext| ext != "epub") {
            return Ok(());
        }
        let path = std::path::absolute(path)?;
        if seen.contains(&path) {
            return Ok(());
        }
        if let Some(catalog) = catalog
            && catalog.find_by_path(&path)?.is_some()
        {
            debug!("{} already catalogued", path.display());
            return Ok(());
        }
        seen.insert(path.clone());
        found.push(path);
        Ok(())
    };

    for item in items {
        let item = item.as_ref();
        if item.is_dir() {
            let walker = WalkDir::new(item).sort_by_file_name();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("error walking {}: {e}", item.display());
                        continue;
                    }
                };
                if entry.file_type().is_file() {
                    consider(entry.path())?;
                }
            }
        } else if item.is_file() {
            consider(item)?;
        } else {
            warn!("{} does not exist", item.display());
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_strategy_parse() {
        assert_eq!("copy".parse::<StorageStrategy>(), Ok(StorageStrategy::Copy));
        assert_eq!("link".parse::<StorageStrategy>(), Ok(StorageStrategy::Link));
        assert!("symlink".parse::<StorageStrategy>().is_err());
        assert_eq!(StorageStrategy::Link.to_string(), "link");
    }

    #[test]
    fn test_summary_display() {
        let summary = ImportSummary {
            imported: 3,
            duplicates: 1,
            skipped: 0,
            failed: 2,
        };
        assert_eq!(summary.total(), 6);
        assert_eq!(
            summary.to_string(),
            "3 files imported, 3 files not imported (1 duplicates, 0 skipped, 2 failed)"
        );
    }

    #[test]
    fn test_find_epubs_walks_and_filters() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("shelf").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("b.epub"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("UPPER.EPUB"), b"").unwrap();
        std::fs::write(nested.join("a.epub"), b"").unwrap();

        let single = dir.path().join("b.epub");
        let found = find_epubs(&[dir.path().to_path_buf(), single.clone()], None).unwrap();

        assert_eq!(found, vec![single, nested.join("a.epub")]);
    }

    #[test]
    fn test_find_epubs_missing_item() {
        let found = find_epubs(&["/nonexistent/dir"], None).unwrap();
        assert!(found.is_empty());
    }
}
