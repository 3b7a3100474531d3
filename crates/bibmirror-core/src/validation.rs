//! # Validation Module
//!
//! Input checks that run before anything reaches the store or the network.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Config / admin input                                         │
//! │  └── THIS MODULE: library fields, citation style hints                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (library_id, remote_key)                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Citation Styles
//! The upstream API rejects unknown style ids, and administrators often
//! leave a placeholder in the style field. Rather than validating against a
//! style catalog, a blocklist of known placeholders decides whether the
//! style hint is sent at all.

use crate::error::ValidationError;
use crate::types::NewLibrary;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Style values that mean "no style chosen".
pub const DEFAULT_PLACEHOLDER_STYLES: &[&str] = &[
    "",
    "-",
    "default",
    "none",
    "style",
    "citation-style",
    "select",
    "choose",
];

/// Maximum length for a library title.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Largest page the upstream API serves.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Returns true if `style` is a placeholder rather than a real style id.
///
/// Comparison ignores case and surrounding whitespace.
///
/// ## Example
/// ```rust
/// use bibmirror_core::validation::{is_placeholder_style, DEFAULT_PLACEHOLDER_STYLES};
///
/// assert!(is_placeholder_style(" Default ", DEFAULT_PLACEHOLDER_STYLES));
/// assert!(!is_placeholder_style("apa", DEFAULT_PLACEHOLDER_STYLES));
/// ```
pub fn is_placeholder_style<S: AsRef<str>>(style: &str, blocklist: &[S]) -> bool {
    let style = style.trim().to_lowercase();
    style.is_empty()
        || blocklist
            .iter()
            .any(|placeholder| placeholder.as_ref().trim().to_lowercase() == style)
}

/// Validates administrator input for a library.
///
/// ## Rules
/// - Title and API key are required
/// - Remote id is a non-empty run of digits
/// - Sync interval is positive
pub fn validate_new_library(library: &NewLibrary) -> ValidationResult<()> {
    let title = library.title.trim();
    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LENGTH,
        });
    }

    if library.api_key.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "api_key".to_string(),
        });
    }

    let remote_id = library.remote_id.trim();
    if remote_id.is_empty() || !remote_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "remote_id".to_string(),
            reason: "must be the numeric user or group id".to_string(),
        });
    }

    if library.sync_interval_minutes <= 0 {
        return Err(ValidationError::OutOfRange {
            field: "sync_interval_minutes".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a page size against the upstream limit.
pub fn validate_page_size(field: &str, size: i64) -> ValidationResult<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_PAGE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LibraryType;

    fn new_library() -> NewLibrary {
        NewLibrary {
            title: "Lab Publications".into(),
            library_type: LibraryType::Group,
            remote_id: "2234567".into(),
            api_key: "P9NiFoyLeZu2bZNvvuQPDWsd".into(),
            citation_style: "apa".into(),
            citation_locale: "en-US".into(),
            sync_interval_minutes: 60,
        }
    }

    #[test]
    fn test_placeholder_styles() {
        assert!(is_placeholder_style("", DEFAULT_PLACEHOLDER_STYLES));
        assert!(is_placeholder_style("NONE", DEFAULT_PLACEHOLDER_STYLES));
        assert!(!is_placeholder_style("chicago-author-date", DEFAULT_PLACEHOLDER_STYLES));

        let custom = vec!["pick-one".to_string()];
        assert!(is_placeholder_style("pick-one", &custom[..]));
        assert!(!is_placeholder_style("default", &custom[..]));
    }

    #[test]
    fn test_valid_library() {
        assert!(validate_new_library(&new_library()).is_ok());
    }

    #[test]
    fn test_library_requires_key_and_numeric_id() {
        let mut library = new_library();
        library.api_key = "  ".into();
        assert!(matches!(
            validate_new_library(&library),
            Err(ValidationError::Required { .. })
        ));

        let mut library = new_library();
        library.remote_id = "abc".into();
        assert!(matches!(
            validate_new_library(&library),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_interval_must_be_positive() {
        let mut library = new_library();
        library.sync_interval_minutes = 0;
        assert!(validate_new_library(&library).is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(validate_page_size("item_page_size", 50).is_ok());
        assert!(validate_page_size("item_page_size", 0).is_err());
        assert!(validate_page_size("item_page_size", 101).is_err());
    }
}
