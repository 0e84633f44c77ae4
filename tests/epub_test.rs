//! Reading metadata and resources from ePub archives on disk.

mod common;

use common::{EpubBuilder, JPEG_BYTES, opf};
use pathagar::{EpubContainer, Error, read_metadata};
use tempfile::TempDir;

#[test]
fn test_read_metadata_from_archive() {
    let dir = TempDir::new().unwrap();
    let path = EpubBuilder::with_title("Agnes Grey").write(&dir.path().join("agnes.epub"));

    let meta = read_metadata(&path).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Agnes Grey"));
    assert_eq!(meta.creators, vec!["Anne Bronte"]);
    assert_eq!(meta.language_code.as_deref(), Some("en"));
    assert_eq!(meta.cover_reference.as_deref(), Some("images/cover.jpg"));
}

#[test]
fn test_missing_title_is_none() {
    let dir = TempDir::new().unwrap();
    let path = EpubBuilder::new(opf("    <dc:creator>Anonymous</dc:creator>", ""))
        .write(&dir.path().join("untitled.epub"));

    let meta = read_metadata(&path).unwrap();
    assert!(meta.title.is_none());
    assert_eq!(meta.display_title(), "(untitled)");
    assert!(meta.subjects.is_empty());
}

#[test]
fn test_meta_cover_overrides_guide() {
    let dir = TempDir::new().unwrap();
    let package = opf(
        r#"    <dc:title>Covers</dc:title>
    <meta name="cover" content="X"/>"#,
        r#"  <manifest>
    <item id="X" href="images/real-cover.png" media-type="image/png"/>
    <item id="cover" href="images/other.png" media-type="image/png"/>
  </manifest>
  <guide>
    <reference type="cover" title="Cover" href="text/cover.xhtml"/>
  </guide>"#,
    );
    let path = EpubBuilder::new(package).write(&dir.path().join("covers.epub"));

    let meta = read_metadata(&path).unwrap();
    assert_eq!(meta.cover_reference.as_deref(), Some("images/real-cover.png"));
}

#[test]
fn test_guide_cover_fragment_stripped() {
    let dir = TempDir::new().unwrap();
    let package = opf(
        "    <dc:title>Guide</dc:title>",
        r#"  <guide>
    <reference type="toc" title="Contents" href="text/toc.xhtml"/>
    <reference type="cover" title="Cover" href="text/cover.xhtml#start"/>
  </guide>"#,
    );
    let path = EpubBuilder::new(package).write(&dir.path().join("guide.epub"));

    let meta = read_metadata(&path).unwrap();
    assert_eq!(meta.cover_reference.as_deref(), Some("text/cover.xhtml"));
}

#[test]
fn test_extract_resource_relative_to_opf() {
    let dir = TempDir::new().unwrap();
    let path = EpubBuilder::with_title("Resources")
        .entry("OEBPS/images/my%20cover.jpg", b"verbatim")
        .entry("OEBPS/images/space cover.jpg", b"decoded")
        .write(&dir.path().join("res.epub"));

    let mut container = EpubContainer::open(&path).unwrap();
    assert_eq!(container.opf_path(), "OEBPS/content.opf");
    assert_eq!(container.extract_resource("images/cover.jpg").unwrap(), JPEG_BYTES);
    assert_eq!(container.extract_resource("../OEBPS/images/cover.jpg#x").unwrap(), JPEG_BYTES);
    assert_eq!(container.extract_resource("images/my%20cover.jpg").unwrap(), b"verbatim");
    assert_eq!(container.extract_resource("images/space%20cover.jpg").unwrap(), b"decoded");

    let missing = container.extract_resource("images/nothing.png");
    assert!(matches!(missing, Err(Error::MissingResource(_))));
}

#[test]
fn test_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = EpubBuilder::with_title("Closing").write(&dir.path().join("close.epub"));

    let mut container = EpubContainer::open(&path).unwrap();
    container.close();
    container.close();
    assert!(container.is_closed());
    assert!(container.extract_resource("images/cover.jpg").is_err());
}

#[test]
fn test_unreadable_containers() {
    let dir = TempDir::new().unwrap();

    let not_zip = dir.path().join("plain.epub");
    std::fs::write(&not_zip, b"this is not a zip archive").unwrap();
    assert!(matches!(
        EpubContainer::open(&not_zip),
        Err(Error::UnreadableContainer { .. })
    ));

    let no_container = EpubBuilder::with_title("Bare")
        .without_container()
        .write(&dir.path().join("bare.epub"));
    assert!(matches!(
        EpubContainer::open(&no_container),
        Err(Error::UnreadableContainer { .. })
    ));
}

#[test]
fn test_missing_metadata_is_malformed() {
    let dir = TempDir::new().unwrap();
    let package = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf"><manifest/></package>"#;
    let path = EpubBuilder::new(package).write(&dir.path().join("nometa.epub"));

    assert!(matches!(read_metadata(&path), Err(Error::MalformedMetadata(_))));
}
