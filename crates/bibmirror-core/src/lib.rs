//! # bibmirror-core: Records and Rules for bibmirror
//!
//! The pure part of bibmirror: the records mirrored from the remote
//! bibliography API, the rules that derive local fields from raw metadata,
//! and the search planner. Nothing here touches the network or the database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bibmirror Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bibmirror-sync (Sync Engine)                   │   │
//! │  │    ApiClient ──► SyncOrchestrator ──► SyncReport               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ bibmirror-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ metadata  │  │  search   │  │ stopwords │  │   │
//! │  │   │  Library  │  │   year    │  │  weights  │  │  en/de/fr │  │   │
//! │  │   │   Item    │  │  titles   │  │  tokens   │  │  es/it/nl │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  bibmirror-db (Database Layer)                  │   │
//! │  │         SQLite upserts, link tables, weighted search SQL        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Library, Collection, Item, CreatorMapping, etc.)
//! - [`metadata`] - Fields derived from raw upstream metadata
//! - [`search`] - Search query, field weights, token planning
//! - [`stopwords`] - Stopword sources
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation and the citation-style blocklist
//!
//! ## Example Usage
//!
//! ```rust
//! use bibmirror_core::metadata::extract_year;
//! use bibmirror_core::search::{plan_tokens, TokenMode};
//! use bibmirror_core::stopwords::BuiltinStopwords;
//!
//! assert_eq!(extract_year("circa 1999, reprint"), "1999");
//!
//! let tokens = plan_tokens("the graph of things", TokenMode::And, 5, "en", &BuiltinStopwords);
//! assert_eq!(tokens, vec!["graph", "things"]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod metadata;
pub mod search;
pub mod stopwords;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use search::{FieldWeights, SearchField, SearchHit, SearchQuery, TokenMode};
pub use stopwords::{BuiltinStopwords, StopwordSource};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upstream API version sent with every request.
pub const API_VERSION: &str = "3";

/// Default upstream base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.zotero.org";
