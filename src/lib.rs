//! # pathagar
//!
//! ePub ingestion for a self-hosted book catalog.
//!
//! ## Features
//!
//! - Read Dublin Core metadata and the cover reference from an ePub's OPF package
//! - Import ePubs into a catalog, deduplicated by SHA-256 content hash
//! - Keep book files as owned copies or as links to the originals
//! - Resync moved files with their catalog records
//!
//! ## Quick Start
//!
//! ```no_run
//! use pathagar::{ImportOptions, Importer, InMemoryCatalog, LocalFileStore, find_epubs};
//!
//! let mut catalog = InMemoryCatalog::load("catalog.json").unwrap();
//! let mut files = LocalFileStore::new("media");
//!
//! let paths = find_epubs(&["library/"], Some(&catalog)).unwrap();
//! let summary = Importer::new(&mut catalog, &mut files, ImportOptions::default())
//!     .import_many(&paths);
//! println!("{summary}");
//!
//! catalog.save("catalog.json").unwrap();
//! ```
//!
//! ## Reading Metadata
//!
//! ```
//! use pathagar::epub::parse_opf;
//!
//! let opf = r#"<package xmlns="http://www.idpf.org/2007/opf">
//!   <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
//!     <dc:title>Agnes Grey</dc:title>
//!     <dc:creator>Anne Bronte</dc:creator>
//!   </metadata>
//! </package>"#;
//!
//! let metadata = parse_opf(opf).unwrap();
//! assert_eq!(metadata.title.as_deref(), Some("Agnes Grey"));
//! assert_eq!(metadata.creators, vec!["Anne Bronte"]);
//! ```

pub mod book;
pub mod catalog;
pub mod config;
pub mod epub;
mod error;
pub mod hash;
pub mod ingest;
pub mod resync;
pub mod storage;
pub(crate) mod util;

pub use book::{BookMetadata, Identifier};
pub use catalog::{CatalogRecord, CatalogStore, InMemoryCatalog, NewRecord, RecordId};
pub use config::Config;
pub use epub::{EpubContainer, read_metadata};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use ingest::{
    ImportOptions, ImportOutcome, ImportSummary, Importer, StorageStrategy, find_epubs,
};
pub use resync::{ReconcileOutcome, Reconciler, ReplaceStrategy, ResyncSummary};
pub use storage::{FileStore, LocalFileStore, StorageArea, StoredFile};
