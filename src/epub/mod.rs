//! ePub container access and OPF metadata parsing.

mod container;
pub mod parser;

pub use container::EpubContainer;
pub use parser::{GuideReference, ManifestItem, parse_container_xml, parse_opf, resolve_cover};

use std::path::Path;

use crate::book::BookMetadata;
use crate::error::Result;

/// Read the metadata of the ePub at `path` without extracting anything else.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<BookMetadata> {
    let mut container = EpubContainer::open(path)?;
    let metadata = container.metadata();
    container.close();
    metadata
}
