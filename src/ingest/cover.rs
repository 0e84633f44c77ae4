use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::debug;
use tempfile::{Builder, NamedTempFile};

use crate::error::Result;
use crate::util::resource_extension;

/// Cover image bytes extracted to a temporary file for one import.
///
/// The file is removed by [`TemporaryCoverAsset::discard`] or when the value
/// is dropped, so every exit path of an import cleans it up.
#[derive(Debug)]
pub struct TemporaryCoverAsset {
    file: Option<NamedTempFile>,
    extension: String,
}

impl TemporaryCoverAsset {
    /// Write `data` to a new temporary file in `dir` (or the OS temp dir),
    /// keeping the extension of `href` so the committed cover keeps it too.
    pub fn create(dir: Option<&Path>, href: &str, data: &[u8]) -> Result<Self> {
        let extension = resource_extension(href, data);
        let mut builder = Builder::new();
        builder.prefix("pathagar-cover-").suffix(&extension);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(data)?;
        file.flush()?;
        debug!("extracted cover {href} to {}", file.path().display());

        Ok(Self {
            file: Some(file),
            extension,
        })
    }

    /// Extension with the leading dot, or empty when unknown.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path())
    }

    /// Open the extracted bytes for reading from the start.
    pub fn open(&self) -> Result<File> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| std::io::Error::other("cover asset already discarded"))?;
        Ok(file.reopen()?)
    }

    /// Delete the temporary file now. Calling it again does nothing.
    pub fn discard(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            file.close()?;
            debug!("removed temporary cover {}", path.display());
        }
        Ok(())
    }
}
