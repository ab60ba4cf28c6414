//! The candidate-selection rules.

use crate::{split_locale_suffix, LocaleCode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file competing to be loaded for its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCandidate {
    /// Path of the candidate file.
    pub path: PathBuf,
    /// Base name with locale suffix and extension stripped.
    pub base: String,
    /// Explicit locale suffix, if the file name carried one.
    pub locale: Option<LocaleCode>,
}

impl LocaleCandidate {
    /// Classify a file path into a candidate.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (base, locale) = split_locale_suffix(&stem);
        Self {
            base: base.to_string(),
            locale,
            path,
        }
    }

    /// The locale this candidate represents; no suffix means `en_US`.
    pub fn effective_locale(&self) -> LocaleCode {
        self.locale.clone().unwrap_or_else(LocaleCode::default_locale)
    }

    fn matches_exactly(&self, target: &LocaleCode) -> bool {
        match &self.locale {
            Some(code) => code == target,
            None => target.is_default(),
        }
    }
}

/// Choose the single candidate to load for a target locale.
///
/// All candidates must share one base name. In order:
/// 1. An exact match wins (explicit suffix equal to the target, or no
///    suffix when the target is `en_US`). A suffixless file beats an
///    explicit `_en_US` sibling — the suffixless file is the default
///    representative.
/// 2. Without an exact match, the suffixless file wins.
/// 3. A lone candidate wins regardless of its suffix.
/// 4. An explicit `_en_US` file wins for a non-default target when nothing
///    better exists.
/// 5. Otherwise nothing loads. In particular, several non-default siblings
///    with no exact match and no default present load nothing.
pub fn resolve<'a>(
    candidates: &'a [LocaleCandidate],
    target: &LocaleCode,
) -> Option<&'a LocaleCandidate> {
    let exact: Vec<&LocaleCandidate> = candidates
        .iter()
        .filter(|c| c.matches_exactly(target))
        .collect();
    if !exact.is_empty() {
        let chosen = exact
            .iter()
            .find(|c| c.locale.is_none())
            .copied()
            .unwrap_or(exact[0]);
        return Some(chosen);
    }

    if let Some(unsuffixed) = candidates.iter().find(|c| c.locale.is_none()) {
        return Some(unsuffixed);
    }

    if candidates.len() == 1 {
        return Some(&candidates[0]);
    }

    if !target.is_default() {
        if let Some(default_variant) = candidates
            .iter()
            .find(|c| c.effective_locale().is_default())
        {
            return Some(default_variant);
        }
    }

    debug!(
        base = candidates.first().map(|c| c.base.as_str()).unwrap_or(""),
        %target,
        "no locale candidate selected"
    );
    None
}

/// Whether one specific file should load, given its siblings.
pub fn should_load(file: &Path, siblings: &[LocaleCandidate], target: &LocaleCode) -> bool {
    let candidate = LocaleCandidate::from_path(file);
    let peers: Vec<LocaleCandidate> = siblings
        .iter()
        .filter(|c| c.base == candidate.base)
        .cloned()
        .collect();
    match resolve(&peers, target) {
        Some(chosen) => chosen.path == candidate.path,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn candidates(names: &[&str]) -> Vec<LocaleCandidate> {
        names
            .iter()
            .map(|n| LocaleCandidate::from_path(format!("/conf/{n}")))
            .collect()
    }

    fn target(s: &str) -> LocaleCode {
        LocaleCode::parse(s).unwrap()
    }

    #[test_case(&["x.xml", "x_fr_FR.xml"], "de_DE", Some("x.xml"); "fallback to default file")]
    #[test_case(&["x.xml", "x_fr_FR.xml"], "fr_FR", Some("x_fr_FR.xml"); "exact suffix match")]
    #[test_case(&["x.xml", "x_fr_FR.xml"], "en_US", Some("x.xml"); "suffixless is en_US")]
    #[test_case(&["x_fr_FR.xml"], "de_DE", Some("x_fr_FR.xml"); "lone candidate loads")]
    #[test_case(&["x_en_US.xml", "x_fr_FR.xml"], "de_DE", Some("x_en_US.xml"); "explicit en_US variant as fallback")]
    #[test_case(&["x_fr_FR.xml", "x_de_DE.xml"], "ja_JP", None; "pinned: ambiguous non-default siblings load nothing")]
    #[test_case(&["x.xml", "x_en_US.xml"], "en_US", Some("x.xml"); "suffixless beats explicit en_US")]
    #[test_case(&["x.xml", "x_en_US.xml"], "fr_FR", Some("x.xml"); "suffixless fallback beats explicit en_US")]
    #[test_case(&["x_en_US.xml"], "en_US", Some("x_en_US.xml"); "explicit en_US exact")]
    fn test_resolution(names: &[&str], locale: &str, expected: Option<&str>) {
        let set = candidates(names);
        let chosen = resolve(&set, &target(locale));
        assert_eq!(
            chosen.map(|c| c.path.file_name().unwrap().to_str().unwrap()),
            expected
        );
    }

    #[test]
    fn test_at_most_one_candidate_loads() {
        let set = candidates(&["x.xml", "x_en_US.xml", "x_fr_FR.xml", "x_de_DE.xml"]);
        for locale in ["en_US", "fr_FR", "de_DE", "ja_JP"] {
            let loading: Vec<_> = set
                .iter()
                .filter(|c| should_load(&c.path, &set, &target(locale)))
                .collect();
            assert!(
                loading.len() <= 1,
                "locale {locale} loaded {} candidates",
                loading.len()
            );
        }
    }

    #[test]
    fn test_should_load_ignores_other_base_names() {
        let siblings = candidates(&["x.xml", "y_fr_FR.xml"]);
        assert!(should_load(
            Path::new("/conf/y_fr_FR.xml"),
            &siblings,
            &target("fr_FR")
        ));
        // y_fr_FR is the lone candidate for base y, so it also loads as a
        // fallback for other locales.
        assert!(should_load(
            Path::new("/conf/y_fr_FR.xml"),
            &siblings,
            &target("de_DE")
        ));
    }

    #[test]
    fn test_resolution_never_errors_on_empty_set() {
        assert_eq!(resolve(&[], &target("fr_FR")), None);
    }
}
