//! Owned file storage: book files and covers kept under a media root.
//!
//! A stored book file is either a copy of the imported ePub or a symbolic
//! link to it. Names are never overwritten; a colliding name gets a numeric
//! suffix before its extension.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level directory a stored file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Books,
    Covers,
}

impl StorageArea {
    pub fn dir_name(self) -> &'static str {
        match self {
            StorageArea::Books => "books",
            StorageArea::Covers => "covers",
        }
    }
}

/// Reference to a file owned by a [`FileStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredFile {
    pub area: StorageArea,
    pub name: String,
}

impl StoredFile {
    pub fn new(area: StorageArea, name: impl Into<String>) -> Self {
        Self {
            area,
            name: name.into(),
        }
    }

    /// Path relative to the store root (e.g. `books/agnes-grey.epub`).
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.area.dir_name()).join(&self.name)
    }
}

/// Storage collaborator for book files and cover images.
pub trait FileStore {
    /// Store a copy of everything `source` yields under a name derived from `filename`.
    fn save_copy(
        &mut self,
        area: StorageArea,
        filename: &str,
        source: &mut dyn Read,
    ) -> Result<StoredFile>;

    /// Store a symbolic link to `target` under a name derived from `filename`.
    fn save_link(&mut self, area: StorageArea, filename: &str, target: &Path)
    -> Result<StoredFile>;

    /// Remove a stored file. Removing a file that is already gone succeeds.
    fn delete(&mut self, file: &StoredFile) -> Result<()>;

    /// Whether the stored file is a link rather than an owned copy.
    fn is_link(&self, file: &StoredFile) -> Result<bool>;

    /// Absolute location of the stored file.
    fn path_of(&self, file: &StoredFile) -> PathBuf;
}

/// [`FileStore`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the area directory and pick a name no existing entry uses.
    fn available_path(&self, area: StorageArea, filename: &str) -> Result<(String, PathBuf)> {
        let dir = self.root.join(area.dir_name());
        fs::create_dir_all(&dir)?;

        let filename = sanitize_filename(filename);
        let (stem, ext) = split_extension(&filename);
        let mut name = filename.clone();
        let mut counter = 1;
        // symlink_metadata so dangling links also count as taken
        while fs::symlink_metadata(dir.join(&name)).is_ok() {
            name = format!("{stem}_{counter}{ext}");
            counter += 1;
        }
        let path = dir.join(&name);
        Ok((name, path))
    }
}

impl FileStore for LocalFileStore {
    fn save_copy(
        &mut self,
        area: StorageArea,
        filename: &str,
        source: &mut dyn Read,
    ) -> Result<StoredFile> {
        let (name, path) = self.available_path(area, filename)?;
        let mut dest = fs::File::create_new(&path)?;
        if let Err(e) = io::copy(source, &mut dest) {
            drop(dest);
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        debug!("stored copy {}", path.display());
        Ok(StoredFile::new(area, name))
    }

    fn save_link(
        &mut self,
        area: StorageArea,
        filename: &str,
        target: &Path,
    ) -> Result<StoredFile> {
        let (name, path) = self.available_path(area, filename)?;
        let target = std::path::absolute(target)?;
        symlink_file(&target, &path)?;
        debug!("stored link {} -> {}", path.display(), target.display());
        Ok(StoredFile::new(area, name))
    }

    fn delete(&mut self, file: &StoredFile) -> Result<()> {
        let path = self.path_of(file);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_link(&self, file: &StoredFile) -> Result<bool> {
        let meta = fs::symlink_metadata(self.path_of(file))?;
        Ok(meta.file_type().is_symlink())
    }

    fn path_of(&self, file: &StoredFile) -> PathBuf {
        self.root.join(file.relative_path())
    }
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Keep only the final path component, falling back to `file` when empty.
fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "file".to_string()
    } else {
        name.to_string()
    }
}

/// Split `name.ext` into (`name`, `.ext`); dotfiles have no extension.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(i) if i > 0 => filename.split_at(i),
        _ => (filename, ""),
    }
}
