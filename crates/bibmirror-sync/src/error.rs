//! # Sync Error Types
//!
//! Error types for the API client and the sync orchestrator.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     API response        │ │
//! │  │                 │  │  (fatal, no     │  │                         │ │
//! │  │  InvalidConfig  │  │   retry)        │  │  Api {path, status}     │ │
//! │  │  InvalidUrl     │  │  Transport      │  │  MalformedPayload       │ │
//! │  │  ConfigLoad/Save│  │  Timeout        │  │  {context, preview}     │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Rate limits (429 / Backoff) never surface here: the client absorbs    │
//! │  them, and an exhausted retry budget degrades to Api { status: 429 }.  │
//! │                                                                         │
//! │  Any of these aborts one library's run; `sync()` turns it into an      │
//! │  entry of SyncReport.errors.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Longest payload excerpt kept in a [`SyncError::MalformedPayload`].
pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// DNS, connect, TLS, or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded the client timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // API Errors
    // =========================================================================
    /// Non-success HTTP status for a request path.
    #[error("API error: {path} returned HTTP {status}")]
    Api { path: String, status: u16 },

    /// A response body could not be decoded.
    #[error("Malformed payload ({context}): {preview}")]
    MalformedPayload { context: String, preview: String },

    // =========================================================================
    // Store / Domain Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] bibmirror_db::DbError),

    #[error(transparent)]
    Core(#[from] bibmirror_core::CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<bibmirror_core::ValidationError> for SyncError {
    fn from(err: bibmirror_core::ValidationError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl SyncError {
    /// Builds a [`SyncError::MalformedPayload`] with a bounded preview of
    /// the offending body.
    pub fn malformed(context: impl Into<String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        SyncError::MalformedPayload {
            context: context.into(),
            preview,
        }
    }

    /// Returns true for failures below HTTP (connect, DNS, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(SyncError::Transport("dns".into()).is_transport());
        assert!(SyncError::Timeout(300).is_transport());
        assert!(!SyncError::Api { path: "/x".into(), status: 500 }.is_transport());
        assert!(SyncError::InvalidUrl("nope".into()).is_config_error());
    }

    #[test]
    fn test_api_error_names_path_and_status() {
        let err = SyncError::Api {
            path: "/groups/1/items/top".into(),
            status: 403,
        };
        assert_eq!(err.to_string(), "API error: /groups/1/items/top returned HTTP 403");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_malformed_preview_is_bounded() {
        let body = "x".repeat(1000);
        match SyncError::malformed("collections page", body.as_bytes()) {
            SyncError::MalformedPayload { context, preview } => {
                assert_eq!(context, "collections page");
                assert_eq!(preview.len(), PREVIEW_CHARS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
