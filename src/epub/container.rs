use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;
use percent_encoding::percent_decode_str;
use zip::ZipArchive;
use zip::result::ZipError;

use super::parser::{parse_container_xml, parse_opf};
use crate::book::BookMetadata;
use crate::error::{Error, Result};
use crate::util::decode_xml;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// An open ePub archive with its root OPF document located.
///
/// The archive handle is released by [`EpubContainer::close`] or on drop,
/// whichever comes first. Closing twice is a no-op.
pub struct EpubContainer {
    path: PathBuf,
    archive: Option<ZipArchive<BufReader<File>>>,
    opf_path: String,
}

impl EpubContainer {
    /// Open the archive at `path` and resolve its root OPF reference.
    ///
    /// Fails with [`Error::UnreadableContainer`] if the file is not a ZIP
    /// archive, has no readable `META-INF/container.xml`, or the rootfile it
    /// names is not present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::unreadable(path, e))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| Error::unreadable(path, e))?;

        let container = read_entry(&mut archive, CONTAINER_PATH)
            .map_err(|e| Error::unreadable(path, format!("{CONTAINER_PATH}: {e}")))?;
        let opf_path = parse_container_xml(&container).map_err(|e| Error::unreadable(path, e))?;

        if archive.index_for_name(&opf_path).is_none() {
            return Err(Error::unreadable(
                path,
                format!("rootfile {opf_path} not found in archive"),
            ));
        }
        debug!("{}: OPF at {opf_path}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            opf_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive path of the root OPF document (e.g. `OEBPS/content.opf`).
    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    /// Directory of the OPF document inside the archive, with a trailing
    /// slash, or empty when the OPF sits at the archive root.
    pub fn opf_base(&self) -> String {
        match self.opf_path.rfind('/') {
            Some(i) => self.opf_path[..=i].to_string(),
            None => String::new(),
        }
    }

    /// Read and decode the OPF package document.
    pub fn read_opf(&mut self) -> Result<String> {
        let opf_path = self.opf_path.clone();
        let bytes = read_entry(self.archive_mut()?, &opf_path)
            .map_err(|e| Error::unreadable(&self.path, e))?;
        Ok(decode_xml(&bytes).into_owned())
    }

    /// Read and parse the OPF package document.
    pub fn metadata(&mut self) -> Result<BookMetadata> {
        let opf = self.read_opf()?;
        parse_opf(&opf)
    }

    /// Read a resource referenced from the OPF (`href` is relative to it).
    ///
    /// The href is looked up verbatim first, then percent-decoded. Fails with
    /// [`Error::MissingResource`] when neither form exists in the archive.
    pub fn extract_resource(&mut self, href: &str) -> Result<Vec<u8>> {
        let base = self.opf_base();
        let href = href.split('#').next().unwrap_or_default();
        let archive = self.archive_mut()?;

        let mut candidates = vec![resolve_path(&base, href)];
        let decoded = percent_decode_str(href).decode_utf8_lossy();
        if decoded != href {
            candidates.push(resolve_path(&base, &decoded));
        }

        for candidate in &candidates {
            match read_entry(archive, candidate) {
                Ok(data) => return Ok(data),
                Err(ZipError::FileNotFound) => continue,
                Err(e) => return Err(Error::Zip(e)),
            }
        }

        Err(Error::MissingResource(candidates.swap_remove(0)))
    }

    /// Release the archive handle.
    pub fn close(&mut self) {
        if self.archive.take().is_some() {
            debug!("{}: closed", self.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }

    fn archive_mut(&mut self) -> Result<&mut ZipArchive<BufReader<File>>> {
        let path = &self.path;
        self.archive
            .as_mut()
            .ok_or_else(|| Error::unreadable(path, "container already closed"))
    }
}

impl Drop for EpubContainer {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// ZIP Helpers
// ----------------------------------------------------------------------------

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<Vec<u8>, ZipError> {
    let mut entry = archive.by_name(name)?;
    let mut data = Vec::with_capacity(capacity_hint(entry.size()));
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Largest buffer reserved up front from an entry's declared size.
const MAX_PREALLOC: usize = 1 << 20;

/// Declared sizes come from the archive and are not trusted beyond
/// [`MAX_PREALLOC`]; `read_to_end` grows the buffer past that.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

/// Join `href` onto `base`, collapsing `.` and `..` segments.
fn resolve_path(base: &str, href: &str) -> String {
    let href = href.trim_start_matches('/');
    let joined = format!("{base}{href}");

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_hint_is_capped() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(4096), 4096);
        assert_eq!(capacity_hint(u64::MAX), MAX_PREALLOC);
        assert_eq!(capacity_hint(MAX_PREALLOC as u64 + 1), MAX_PREALLOC);
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("OEBPS/", "images/cover.jpg"), "OEBPS/images/cover.jpg");
        assert_eq!(resolve_path("OEBPS/Text/", "../Images/c.png"), "OEBPS/Images/c.png");
        assert_eq!(resolve_path("", "./cover.jpg"), "cover.jpg");
        assert_eq!(resolve_path("OEBPS/", "/cover.jpg"), "OEBPS/cover.jpg");
    }

    #[test]
    fn test_open_missing_file() {
        let result = EpubContainer::open("/nonexistent/book.epub");
        assert!(matches!(result, Err(Error::UnreadableContainer { .. })));
    }

    #[test]
    fn test_open_not_a_zip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fake.epub");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();

        let result = EpubContainer::open(&path);
        assert!(matches!(result, Err(Error::UnreadableContainer { .. })));
    }
}
