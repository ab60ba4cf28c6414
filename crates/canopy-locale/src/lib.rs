//! Locale-aware selection among sibling configuration files.
//!
//! Candidate files share a base name and optionally carry a `_ll_CC` suffix
//! immediately before the extension; a missing suffix means `en_US`. For any
//! (base name, target locale) pair at most one candidate loads.

pub mod detect;
pub mod resolve;

pub use detect::{detect_locale, detect_locale_with_override};
pub use resolve::{resolve, should_load, LocaleCandidate};

use std::fmt;

/// A `language_COUNTRY` locale code, e.g. `fr_FR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocaleCode {
    language: String,
    country: String,
}

impl LocaleCode {
    /// Create a code, normalizing case.
    pub fn new(language: &str, country: &str) -> Self {
        Self {
            language: language.to_lowercase(),
            country: country.to_uppercase(),
        }
    }

    /// Parse from `ll_CC` or `ll-CC`. Two-letter language and country only.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.replace('-', "_");
        let (language, country) = normalized.split_once('_')?;
        if language.len() != 2 || country.len() != 2 {
            return None;
        }
        if !language.chars().all(|c| c.is_ascii_alphabetic())
            || !country.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }
        Some(Self::new(language, country))
    }

    /// The default locale, `en_US`. Files without a suffix carry it
    /// implicitly.
    pub fn default_locale() -> Self {
        Self::new("en", "US")
    }

    /// Whether this is the default `en_US` locale.
    pub fn is_default(&self) -> bool {
        self == &Self::default_locale()
    }

    /// The language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The country code.
    pub fn country(&self) -> &str {
        &self.country
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.language, self.country)
    }
}

/// Split a file stem into its base name and locale suffix.
///
/// `messages_fr_FR` → `("messages", Some(fr_FR))`; `messages` → no suffix.
pub fn split_locale_suffix(stem: &str) -> (&str, Option<LocaleCode>) {
    // Suffix shape: `_ll_CC`, exactly 6 trailing bytes.
    if stem.len() > 6 && stem.is_char_boundary(stem.len() - 6) {
        let (base, tail) = stem.split_at(stem.len() - 6);
        if let Some(suffix) = tail.strip_prefix('_') {
            if let Some(code) = LocaleCode::parse(suffix) {
                // Only lowercase language / uppercase country spell a
                // suffix; `Foo_ab_cd` stays a plain base name.
                if suffix == format!("{code}") {
                    return (base, Some(code));
                }
            }
        }
    }
    (stem, None)
}
