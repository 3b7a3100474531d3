//! # Error Types
//!
//! Domain-specific error types for bibmirror-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bibmirror-core errors (this file)                                     │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bibmirror-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bibmirror-sync errors (separate crate)                                │
//! │  └── SyncError        - Transport, API status, payload, config         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError → report      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Library cannot be found.
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    /// A library sync-state change that the state machine forbids.
    ///
    /// ## When This Occurs
    /// - Marking a library OK that was never marked RUNNING
    /// - Marking a library ERROR straight from OK
    #[error("Library {library_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        library_id: String,
        from: String,
        to: String,
    },

    /// Raw metadata is not the shape the upstream API documents.
    #[error("Malformed metadata for {key}: {reason}")]
    MalformedMetadata { key: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before anything reaches the database or the network.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. non-numeric remote id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidStateTransition {
            library_id: "lib-1".to_string(),
            from: "OK".to_string(),
            to: "ERROR".to_string(),
        };
        assert_eq!(err.to_string(), "Library lib-1 cannot move from OK to ERROR");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "api_key".to_string(),
        };
        assert_eq!(err.to_string(), "api_key is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "title".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
