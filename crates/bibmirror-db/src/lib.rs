//! # bibmirror-db: Database Layer for bibmirror
//!
//! The local relational store the mirror is reconciled into, and the
//! weighted search that runs over it. SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bibmirror Data Flow                              │
//! │                                                                         │
//! │  SyncOrchestrator (bibmirror-sync)          search callers             │
//! │       │ upserts, links, sync state               │ SearchQuery          │
//! │       ▼                                          ▼                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bibmirror-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories   │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ library, item,  │   │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │ collection,     │   │ 001_initial  │  │   │
//! │  │   │               │    │ link, search... │   │              │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bibmirror_core::{BuiltinStopwords, SearchQuery};
//! use bibmirror_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("mirror.db")).await?;
//! let query = SearchQuery::new(vec![library_id], "graph neural networks");
//! let hits = db.search().search(&query, &BuiltinStopwords).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::attachment::AttachmentRepository;
pub use repository::collection::CollectionRepository;
pub use repository::creator::CreatorRepository;
pub use repository::item::ItemRepository;
pub use repository::library::LibraryRepository;
pub use repository::link::LinkRepository;
pub use repository::search::SearchRepository;
