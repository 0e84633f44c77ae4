use serde::{Deserialize, Serialize};

use super::LanguageId;
use crate::error::{Error, Result};

/// A catalog language, keyed by its normalised code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub code: String,
    pub name: String,
}

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("bn", "Bengali"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("ht", "Haitian Creole"),
    ("hu", "Hungarian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("la", "Latin"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("qu", "Quechua"),
    ("ru", "Russian"),
    ("rw", "Kinyarwanda"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("zh", "Chinese"),
];

/// Normalise a Dublin Core language value and look up its display name.
///
/// Accepts BCP 47 shaped codes (`en`, `EN-us`, `pt_BR`, `ast`): the primary
/// subtag must be 2 or 3 ASCII letters and any further subtags alphanumeric.
/// Returns `(code, name)` where `code` is the lowercase primary subtag and
/// `name` falls back to the code for languages missing from the table.
pub fn resolve_language_code(raw: &str) -> Result<(String, String)> {
    let unresolved = || Error::UnresolvedLanguageCode(raw.to_string());

    let trimmed = raw.trim();
    let mut subtags = trimmed.split(['-', '_']);
    let primary = subtags.next().unwrap_or_default();

    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(unresolved());
    }
    if !subtags.all(|tag| !tag.is_empty() && tag.len() <= 8 && tag.chars().all(|c| c.is_ascii_alphanumeric())) {
        return Err(unresolved());
    }

    let code = primary.to_ascii_lowercase();
    let name = LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.clone());
    Ok((code, name))
}
