//! ePub fixtures written at test time.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Smallest JPEG-looking payload: the SOI marker and a JFIF header.
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Wrap `metadata` (the inner XML of `<metadata>`) and `rest` (manifest,
/// guide) in an OPF package.
pub fn opf(metadata: &str, rest: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
{metadata}
  </metadata>
{rest}
</package>"#
    )
}

/// Builder for a small ePub archive on disk.
pub struct EpubBuilder {
    opf: String,
    entries: Vec<(String, Vec<u8>)>,
    container: Option<String>,
}

impl EpubBuilder {
    pub fn new(opf: impl Into<String>) -> Self {
        Self {
            opf: opf.into(),
            entries: Vec::new(),
            container: Some(CONTAINER_XML.to_string()),
        }
    }

    /// A book titled `title` with a cover image referenced from `<meta name="cover">`.
    pub fn with_title(title: &str) -> Self {
        Self::new(opf(
            &format!(
                r#"    <dc:title>{title}</dc:title>
    <dc:creator>Anne Bronte</dc:creator>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>"#
            ),
            r#"  <manifest>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
  </manifest>"#,
        ))
        .entry("OEBPS/images/cover.jpg", JPEG_BYTES)
    }

    /// Add an archive entry (path relative to the archive root).
    pub fn entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn without_container(mut self) -> Self {
        self.container = None;
        self
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        if let Some(container) = &self.container {
            zip.start_file("META-INF/container.xml", deflated).unwrap();
            zip.write_all(container.as_bytes()).unwrap();
        }
        zip.start_file("OEBPS/content.opf", deflated).unwrap();
        zip.write_all(self.opf.as_bytes()).unwrap();
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), deflated).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        path.to_path_buf()
    }
}

/// Number of entries directly inside `dir` (zero when it does not exist).
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
