//! Target-locale detection from the environment.

use crate::LocaleCode;
use std::env;
use tracing::debug;

/// Detect the target locale, letting an explicit caller preference win.
pub fn detect_locale_with_override(preferred: Option<&str>) -> LocaleCode {
    if let Some(s) = preferred {
        if let Some(code) = parse_env_locale(s) {
            return code;
        }
        debug!(preferred = s, "ignoring unparseable locale preference");
    }
    detect_locale()
}

/// Detect the target locale from the environment.
///
/// Priority: `CANOPY_LOCALE` > `LC_ALL` > `LC_MESSAGES` > `LANG` > `en_US`.
pub fn detect_locale() -> LocaleCode {
    for var in ["CANOPY_LOCALE", "LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Some(code) = env::var(var).ok().as_deref().and_then(parse_env_locale) {
            return code;
        }
    }
    LocaleCode::default_locale()
}

/// Parse locale strings as the environment spells them, e.g.
/// `fr_FR.UTF-8` or `de_DE@euro`.
fn parse_env_locale(s: &str) -> Option<LocaleCode> {
    let bare = s.split(['.', '@']).next().unwrap_or(s);
    LocaleCode::parse(bare)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_spellings() {
        assert_eq!(parse_env_locale("fr_FR.UTF-8"), Some(LocaleCode::new("fr", "FR")));
        assert_eq!(parse_env_locale("de_DE@euro"), Some(LocaleCode::new("de", "DE")));
        assert_eq!(parse_env_locale("pt-BR"), Some(LocaleCode::new("pt", "BR")));
        assert_eq!(parse_env_locale("C"), None);
        assert_eq!(parse_env_locale("POSIX"), None);
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            detect_locale_with_override(Some("ja_JP")),
            LocaleCode::new("ja", "JP")
        );
    }

    #[test]
    fn test_bad_override_falls_through_to_detection() {
        let detected = detect_locale_with_override(Some("not-a-locale"));
        // Whatever the environment says, detection is total.
        assert_eq!(detected.language().len(), 2);
    }
}
