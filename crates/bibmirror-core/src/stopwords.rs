//! Locale-aware stopword lookup for multi-token search.
//!
//! The search engine only asks "is this word a stopword in this locale?",
//! so any source can be plugged in: the built-in lists, a closure, or a
//! caller-owned table.

use std::collections::HashSet;

use lazy_static::lazy_static;

/// Answers stopword questions for a locale such as `en-US` or `de`.
pub trait StopwordSource: Send + Sync {
    /// Returns true if `word` (already lowercased) is a stopword in `locale`.
    fn is_stopword(&self, word: &str, locale: &str) -> bool;
}

/// A source that never filters anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStopwords;

impl StopwordSource for NoStopwords {
    fn is_stopword(&self, _word: &str, _locale: &str) -> bool {
        false
    }
}

impl<F> StopwordSource for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_stopword(&self, word: &str, locale: &str) -> bool {
        self(word, locale)
    }
}

lazy_static! {
    static ref ENGLISH: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is",
        "it", "of", "on", "or", "over", "the", "to", "under", "via", "with", "without",
    ]
    .into_iter()
    .collect();

    static ref GERMAN: HashSet<&'static str> = [
        "aber", "als", "am", "an", "auf", "aus", "bei", "das", "dem", "den", "der", "des",
        "die", "ein", "eine", "einer", "für", "im", "in", "ist", "mit", "oder", "über",
        "und", "von", "zu", "zum", "zur",
    ]
    .into_iter()
    .collect();

    static ref FRENCH: HashSet<&'static str> = [
        "au", "aux", "avec", "dans", "de", "des", "du", "en", "et", "l", "la", "le", "les",
        "ou", "par", "pour", "sur", "un", "une",
    ]
    .into_iter()
    .collect();

    static ref SPANISH: HashSet<&'static str> = [
        "al", "con", "de", "del", "el", "en", "la", "las", "los", "o", "para", "por", "sobre",
        "un", "una", "y",
    ]
    .into_iter()
    .collect();

    static ref ITALIAN: HashSet<&'static str> = [
        "a", "con", "da", "del", "della", "di", "e", "il", "in", "la", "le", "lo", "o",
        "per", "su", "un", "una",
    ]
    .into_iter()
    .collect();

    static ref DUTCH: HashSet<&'static str> = [
        "de", "een", "en", "het", "in", "met", "naar", "of", "op", "over", "te", "van",
        "voor",
    ]
    .into_iter()
    .collect();
}

/// Short built-in lists for the common UI languages.
///
/// Locales are matched on their language prefix (`de-AT` uses the German
/// list). Unknown languages fall back to English.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinStopwords;

impl BuiltinStopwords {
    fn list_for(locale: &str) -> &'static HashSet<&'static str> {
        let language = locale
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_lowercase();

        match language.as_str() {
            "de" => &GERMAN,
            "fr" => &FRENCH,
            "es" => &SPANISH,
            "it" => &ITALIAN,
            "nl" => &DUTCH,
            _ => &ENGLISH,
        }
    }
}

impl StopwordSource for BuiltinStopwords {
    fn is_stopword(&self, word: &str, locale: &str) -> bool {
        Self::list_for(locale).contains(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_by_language_prefix() {
        let source = BuiltinStopwords;
        assert!(source.is_stopword("the", "en-US"));
        assert!(source.is_stopword("und", "de-AT"));
        assert!(!source.is_stopword("und", "en"));
        assert!(source.is_stopword("les", "fr_FR"));
    }

    #[test]
    fn test_unknown_locale_uses_english() {
        assert!(BuiltinStopwords.is_stopword("of", "sv-SE"));
        assert!(BuiltinStopwords.is_stopword("of", ""));
    }

    #[test]
    fn test_closure_source() {
        let source = |word: &str, _locale: &str| word == "foo";
        assert!(source.is_stopword("foo", "en"));
        assert!(!source.is_stopword("bar", "en"));
        assert!(!NoStopwords.is_stopword("the", "en"));
    }
}
