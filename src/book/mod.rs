use serde::{Deserialize, Serialize};

/// Bibliographic metadata recovered from an OPF package document.
///
/// Scalar Dublin Core fields are `None` when the element is absent or has no
/// text. List fields are empty when no element matched; they keep every
/// element in document order, including blank ones, and callers filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub publishers: Vec<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    pub rights: Option<String>,
    pub language_code: Option<String>,
    pub summary: Option<String>,
    pub subjects: Vec<String>,
    pub identifier: Option<Identifier>,
    /// Container-relative href of the cover image, if any heuristic matched.
    pub cover_reference: Option<String>,
}

/// The first `dc:identifier` of a package: its `id` attribute and its text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub scheme_id: Option<String>,
    pub value: Option<String>,
}

impl BookMetadata {
    /// Title used for display and logging when the package has none.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

impl Identifier {
    pub fn new(scheme_id: Option<String>, value: Option<String>) -> Self {
        Self { scheme_id, value }
    }
}
