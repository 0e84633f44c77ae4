//! Splitting raw Dublin Core strings into catalog associations.

use log::{debug, warn};

/// Subjects longer than this are taken to be descriptions filed as subjects.
pub const MAX_SUBJECT_LEN: usize = 80;

/// Split a raw `dc:creator` value into individual author names.
///
/// Names are separated by `;`, `&` or the word ` and `; each part is trimmed
/// and blank parts are dropped.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.trim()
        .replace(" and ", ";")
        .replace('&', ";")
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split one raw `dc:subject` value into lowercase tags.
///
/// `,`, `;`, `/` and newlines separate tags; colons are removed.
pub fn split_subject(subject: &str) -> Vec<String> {
    subject
        .replace(['/', ';', '\n'], ",")
        .replace(':', "")
        .split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Turn a book's subjects into its tag list, in order and without repeats.
///
/// Processing stops at the first empty subject or the first subject longer
/// than [`MAX_SUBJECT_LEN`] characters; later subjects are ignored.
pub fn subjects_to_tags(subjects: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for subject in subjects {
        let len = subject.chars().count();
        if len == 0 || len > MAX_SUBJECT_LEN {
            if len > 0 {
                warn!("subject of {len} characters looks like a description, ignoring remaining subjects");
            }
            break;
        }
        for tag in split_subject(subject) {
            if !tags.contains(&tag) {
                debug!("found subject (tag): {tag:?}");
                tags.push(tag);
            }
        }
    }
    tags
}
