//! Reconciling catalog records with files that moved on disk.
//!
//! A file is matched to its record by content hash. The record's
//! `original_path` is pointed at the file's new location, and the stored book
//! file may be replaced by a fresh copy or link depending on the
//! [`ReplaceStrategy`]. The old stored file is only deleted once the record
//! references the new one.

use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogRecord, CatalogStore, RecordId};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::storage::{FileStore, StorageArea, StoredFile};

/// When a resynced record gets a new stored file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    /// Re-target links, leave copies alone.
    #[default]
    Original,
    /// Replace whatever is stored with a link to the new path.
    AlwaysLink,
    /// Turn links into copies of the new path; copies are left alone.
    AlwaysCopy,
}

impl fmt::Display for ReplaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplaceStrategy::Original => "original",
            ReplaceStrategy::AlwaysLink => "always-link",
            ReplaceStrategy::AlwaysCopy => "always-copy",
        })
    }
}

impl FromStr for ReplaceStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "original" => Ok(ReplaceStrategy::Original),
            "always-link" => Ok(ReplaceStrategy::AlwaysLink),
            "always-copy" => Ok(ReplaceStrategy::AlwaysCopy),
            other => Err(format!("unknown replace strategy {other:?}")),
        }
    }
}

/// What to put in place of the stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replacement {
    Link,
    Copy,
}

impl ReplaceStrategy {
    fn replacement(self, was_link: bool) -> Option<Replacement> {
        match self {
            ReplaceStrategy::AlwaysLink => Some(Replacement::Link),
            ReplaceStrategy::AlwaysCopy if was_link => Some(Replacement::Copy),
            ReplaceStrategy::Original if was_link => Some(Replacement::Link),
            _ => None,
        }
    }
}

/// Result of reconciling one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No record has the file's content hash.
    NotFound,
    Updated(RecordId),
    /// The record already pointed at this path and nothing was replaced.
    Unchanged(RecordId),
}

/// Counts for a batch resync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl ResyncSummary {
    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.not_found + self.failed
    }
}

impl fmt::Display for ResyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records updated, {} unchanged, {} files not in the catalog, {} failed",
            self.updated, self.unchanged, self.not_found, self.failed
        )
    }
}

/// Points catalog records at the current location of their files.
pub struct Reconciler<'a> {
    catalog: &'a mut dyn CatalogStore,
    files: &'a mut dyn FileStore,
    strategy: ReplaceStrategy,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a mut dyn CatalogStore,
        files: &'a mut dyn FileStore,
        strategy: ReplaceStrategy,
    ) -> Self {
        Self {
            catalog,
            files,
            strategy,
        }
    }

    pub fn strategy(&self) -> ReplaceStrategy {
        self.strategy
    }

    /// Match `path` to a record by content hash and update the record.
    pub fn resync_one(&mut self, path: &Path) -> Result<ReconcileOutcome> {
        let path = std::path::absolute(path)?;
        let hash = ContentHash::of_file(&path)?;

        let Some(mut record) = self.catalog.find_by_hash(&hash)? else {
            info!("{}: no record with content {hash}", path.display());
            return Ok(ReconcileOutcome::NotFound);
        };

        let was_link = match self.files.is_link(&record.stored_file) {
            Ok(was_link) => was_link,
            Err(e) => {
                warn!("{record}: stored file unreadable, treating as a copy: {e}");
                false
            }
        };

        // A link must not replace the file it already points at
        let replacement = self.strategy.replacement(was_link).filter(|replacement| {
            *replacement == Replacement::Copy || !self.stored_file_is(&record.stored_file, &path)
        });

        if replacement.is_none() && record.original_path == path {
            return Ok(ReconcileOutcome::Unchanged(record.id));
        }

        record.original_path = path.clone();
        match replacement {
            Some(replacement) => self.replace_stored_file(&mut record, &path, replacement)?,
            None => self.catalog.update(&record)?,
        }

        info!("{}: updated {record}", path.display());
        Ok(ReconcileOutcome::Updated(record.id))
    }

    /// Resync files one at a time; a failing item does not stop the batch.
    pub fn resync_many<P: AsRef<Path>>(&mut self, paths: &[P]) -> ResyncSummary {
        let total = paths.len();
        let width = total.to_string().len();
        let mut summary = ResyncSummary::default();

        info!("resyncing {total} items ({} strategy)", self.strategy);
        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            info!("[{:>width$}/{total}] {}", i + 1, path.display());
            match self.resync_one(path) {
                Ok(ReconcileOutcome::Updated(_)) => summary.updated += 1,
                Ok(ReconcileOutcome::Unchanged(_)) => summary.unchanged += 1,
                Ok(ReconcileOutcome::NotFound) => summary.not_found += 1,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("{}: {e}", path.display());
                    } else {
                        error!("{}: {e}", path.display());
                    }
                    summary.failed += 1;
                }
            }
        }
        info!("{summary}");
        summary
    }

    /// Whether the stored file already resolves to `path` on disk.
    fn stored_file_is(&self, stored: &StoredFile, path: &Path) -> bool {
        let stored = fs::canonicalize(self.files.path_of(stored));
        let path = fs::canonicalize(path);
        matches!((stored, path), (Ok(a), Ok(b)) if a == b)
    }

    /// Store the new file, record it, then delete the one it replaces.
    fn replace_stored_file(
        &mut self,
        record: &mut CatalogRecord,
        path: &Path,
        replacement: Replacement,
    ) -> Result<()> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book.epub".to_string());

        let new_file = match replacement {
            Replacement::Link => self.files.save_link(StorageArea::Books, &filename, path)?,
            Replacement::Copy => {
                let mut source = File::open(path)?;
                self.files.save_copy(StorageArea::Books, &filename, &mut source)?
            }
        };

        let old_file = std::mem::replace(&mut record.stored_file, new_file.clone());
        if let Err(e) = self.catalog.update(record) {
            record.stored_file = old_file;
            if let Err(cleanup) = self.files.delete(&new_file) {
                warn!("could not remove stored file {}: {cleanup}", new_file.name);
            }
            return Err(e);
        }

        if let Err(e) = self.files.delete(&old_file) {
            warn!("{record}: old stored file {} not removed: {e}", old_file.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, NewRecord};
    use crate::storage::LocalFileStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        catalog: InMemoryCatalog,
        files: LocalFileStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let files = LocalFileStore::new(dir.path().join("media"));
            Self {
                dir,
                catalog: InMemoryCatalog::new(),
                files,
            }
        }

        fn write(&self, name: &str, data: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, data).unwrap();
            path
        }

        /// Catalogue `path` with a stored copy of its bytes.
        fn add_copy(&mut self, path: &Path) -> RecordId {
            let mut source = File::open(path).unwrap();
            let stored = self
                .files
                .save_copy(StorageArea::Books, "book.epub", &mut source)
                .unwrap();
            self.add_record(path, stored)
        }

        #[cfg(unix)]
        fn add_link(&mut self, path: &Path) -> RecordId {
            let stored = self
                .files
                .save_link(StorageArea::Books, "book.epub", path)
                .unwrap();
            self.add_record(path, stored)
        }

        fn add_record(&mut self, path: &Path, stored: StoredFile) -> RecordId {
            let record = NewRecord {
                content_hash: ContentHash::of_file(path).unwrap(),
                original_path: path.to_path_buf(),
                status: "Published".into(),
                stored_file: stored,
                title: Some("Book".into()),
                date: None,
                source: None,
                rights: None,
                summary: None,
                language: None,
                identifier: None,
            };
            self.catalog.create(record).unwrap()
        }

        fn record(&self, id: RecordId) -> CatalogRecord {
            self.catalog.get(id).unwrap().unwrap()
        }

        fn resync(&mut self, path: &Path, strategy: ReplaceStrategy) -> ReconcileOutcome {
            Reconciler::new(&mut self.catalog, &mut self.files, strategy)
                .resync_one(path)
                .unwrap()
        }
    }

    #[test]
    fn test_strategy_parse_and_display() {
        for strategy in [
            ReplaceStrategy::Original,
            ReplaceStrategy::AlwaysLink,
            ReplaceStrategy::AlwaysCopy,
        ] {
            assert_eq!(strategy.to_string().parse::<ReplaceStrategy>(), Ok(strategy));
        }
        assert!("sometimes".parse::<ReplaceStrategy>().is_err());
    }

    #[test]
    fn test_replacement_table() {
        use Replacement::*;
        assert_eq!(ReplaceStrategy::AlwaysLink.replacement(false), Some(Link));
        assert_eq!(ReplaceStrategy::AlwaysLink.replacement(true), Some(Link));
        assert_eq!(ReplaceStrategy::AlwaysCopy.replacement(false), None);
        assert_eq!(ReplaceStrategy::AlwaysCopy.replacement(true), Some(Copy));
        assert_eq!(ReplaceStrategy::Original.replacement(false), None);
        assert_eq!(ReplaceStrategy::Original.replacement(true), Some(Link));
    }

    #[test]
    fn test_unknown_content_is_not_found() {
        let mut fx = Fixture::new();
        let path = fx.write("stranger.epub", b"never imported");
        assert_eq!(fx.resync(&path, ReplaceStrategy::Original), ReconcileOutcome::NotFound);
    }

    #[test]
    fn test_moved_copy_updates_path_only() {
        let mut fx = Fixture::new();
        let old = fx.write("old.epub", b"book bytes");
        let id = fx.add_copy(&old);
        let stored_before = fx.record(id).stored_file;

        let new = fx.write("new.epub", b"book bytes");
        fs::remove_file(&old).unwrap();
        assert_eq!(fx.resync(&new, ReplaceStrategy::Original), ReconcileOutcome::Updated(id));

        let record = fx.record(id);
        assert_eq!(record.original_path, new);
        assert_eq!(record.stored_file, stored_before);
        assert!(!fx.files.is_link(&record.stored_file).unwrap());
    }

    #[test]
    fn test_same_path_is_unchanged() {
        let mut fx = Fixture::new();
        let path = fx.write("book.epub", b"book bytes");
        let id = fx.add_copy(&path);
        assert_eq!(fx.resync(&path, ReplaceStrategy::Original), ReconcileOutcome::Unchanged(id));
        assert_eq!(fx.resync(&path, ReplaceStrategy::AlwaysCopy), ReconcileOutcome::Unchanged(id));
    }

    #[cfg(unix)]
    #[test]
    fn test_always_link_replaces_copy() {
        let mut fx = Fixture::new();
        let old = fx.write("old.epub", b"book bytes");
        let id = fx.add_copy(&old);
        let old_stored = fx.record(id).stored_file;

        let new = fx.write("new.epub", b"book bytes");
        assert_eq!(fx.resync(&new, ReplaceStrategy::AlwaysLink), ReconcileOutcome::Updated(id));

        let record = fx.record(id);
        assert_eq!(record.original_path, new);
        assert_eq!(record.content_hash, ContentHash::of_file(&new).unwrap());
        assert!(fx.files.is_link(&record.stored_file).unwrap());
        assert_eq!(fs::read_link(fx.files.path_of(&record.stored_file)).unwrap(), new);
        assert!(!fx.files.path_of(&old_stored).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_original_retargets_link() {
        let mut fx = Fixture::new();
        let old = fx.write("old.epub", b"book bytes");
        let id = fx.add_link(&old);

        let new = fx.write("moved.epub", b"book bytes");
        fs::remove_file(&old).unwrap();
        assert_eq!(fx.resync(&new, ReplaceStrategy::Original), ReconcileOutcome::Updated(id));

        let record = fx.record(id);
        assert!(fx.files.is_link(&record.stored_file).unwrap());
        assert_eq!(fs::read(fx.files.path_of(&record.stored_file)).unwrap(), b"book bytes");
    }

    #[cfg(unix)]
    #[test]
    fn test_always_copy_replaces_link() {
        let mut fx = Fixture::new();
        let old = fx.write("old.epub", b"book bytes");
        let id = fx.add_link(&old);

        let new = fx.write("new.epub", b"book bytes");
        assert_eq!(fx.resync(&new, ReplaceStrategy::AlwaysCopy), ReconcileOutcome::Updated(id));

        let record = fx.record(id);
        assert!(!fx.files.is_link(&record.stored_file).unwrap());
        fs::remove_file(&new).unwrap();
        assert_eq!(fs::read(fx.files.path_of(&record.stored_file)).unwrap(), b"book bytes");
    }

    #[cfg(unix)]
    #[test]
    fn test_link_to_same_path_is_not_replaced() {
        let mut fx = Fixture::new();
        let path = fx.write("book.epub", b"book bytes");
        let id = fx.add_link(&path);
        let stored = fx.record(id).stored_file;

        assert_eq!(fx.resync(&path, ReplaceStrategy::AlwaysLink), ReconcileOutcome::Unchanged(id));
        assert_eq!(fx.record(id).stored_file, stored);
    }

    #[cfg(unix)]
    #[test]
    fn test_always_copy_replaces_link_to_same_path() {
        let mut fx = Fixture::new();
        let path = fx.write("book.epub", b"book bytes");
        let id = fx.add_link(&path);
        let link = fx.record(id).stored_file;

        assert_eq!(fx.resync(&path, ReplaceStrategy::AlwaysCopy), ReconcileOutcome::Updated(id));

        let record = fx.record(id);
        assert_eq!(record.original_path, path);
        assert_ne!(record.stored_file, link);
        assert!(!fx.files.is_link(&record.stored_file).unwrap());
        assert!(fs::symlink_metadata(fx.files.path_of(&link)).is_err());

        // The copy outlives the original file
        fs::remove_file(&path).unwrap();
        assert_eq!(fs::read(fx.files.path_of(&record.stored_file)).unwrap(), b"book bytes");
    }

    #[test]
    fn test_resync_many_counts() {
        let mut fx = Fixture::new();
        let known = fx.write("known.epub", b"known");
        fx.add_copy(&known);
        let moved = fx.write("moved.epub", b"known");
        let stranger = fx.write("stranger.epub", b"stranger");
        let missing = fx.dir.path().join("missing.epub");

        let summary = Reconciler::new(&mut fx.catalog, &mut fx.files, ReplaceStrategy::Original)
            .resync_many(&[known, moved, stranger, missing]);

        assert_eq!(
            summary,
            ResyncSummary {
                updated: 1,
                unchanged: 1,
                not_found: 1,
                failed: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
