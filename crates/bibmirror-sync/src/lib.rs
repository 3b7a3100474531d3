//! # bibmirror-sync: Sync Engine for bibmirror
//!
//! Pulls bibliography libraries from the remote API and reconciles them into
//! the local store provided by `bibmirror-db`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncOrchestrator (orchestrator.rs)               │  │
//! │  │                                                                  │  │
//! │  │  Sequential per library: collections → deletions → items →       │  │
//! │  │  collection links → creator links → status                       │  │
//! │  └──────────────┬───────────────────────────────┬───────────────────┘  │
//! │                 │                               │                       │
//! │                 ▼                               ▼                       │
//! │  ┌────────────────────────────┐  ┌────────────────────────────────┐    │
//! │  │  ApiClient (client.rs)     │  │  bibmirror-db repositories     │    │
//! │  │                            │  │                                │    │
//! │  │  version + key headers     │  │  conflict-aware upserts        │    │
//! │  │  Backoff / Retry-After     │  │  link tables, library state    │    │
//! │  │  HttpTransport seam        │  │                                │    │
//! │  └────────────────────────────┘  └────────────────────────────────┘    │
//! │                                                                         │
//! │  MirrorConfig (config.rs): TOML file + BIBMIRROR_* env overrides       │
//! │  SyncProgress (progress.rs): optional progress hooks                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - HTTP client with rate-limit handling
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Sync error types
//! - [`orchestrator`] - The sync pipeline and its report
//! - [`progress`] - Progress reporting trait
//! - [`remote`] - Remote payload shapes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bibmirror_sync::{ApiClient, MirrorConfig, SyncOrchestrator};
//!
//! let config = MirrorConfig::load(None)?;
//! let client = ApiClient::from_settings(&config.api)?;
//! let orchestrator = SyncOrchestrator::new(Arc::new(db), client, config.sync);
//! let report = orchestrator.sync(None).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{ApiClient, ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
pub use config::{ApiSettings, DatabaseSettings, MirrorConfig, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{EntityCounts, SyncOrchestrator, SyncOrchestratorBuilder, SyncReport};
pub use progress::{NoOpProgress, SyncProgress, SyncStage};
