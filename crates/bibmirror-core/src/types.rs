//! # Domain Types
//!
//! Records mirrored from the remote bibliography API, plus the library
//! bookkeeping the sync engine maintains.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Library      │   │   Collection    │   │      Item       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  library_id     │   │  library_id     │       │
//! │  │  library_type   │   │  remote_key     │   │  remote_key     │       │
//! │  │  remote_id      │   │  parent_id?     │   │  year (derived) │       │
//! │  │  last_version   │   │  title          │   │  raw_data (map) │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                        │                │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────┴────────┐       │
//! │  │  CreatorMapping │   │     Author      │   │ ItemAttachment  │       │
//! │  │  first, last    │──►│  local identity │   │  metadata only  │       │
//! │  │  author_id?     │   │                 │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every mirrored row has:
//! - `id`: UUID v4 - local, used for foreign keys
//! - `remote_key`: the upstream key, unique per library

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Library Type
// =============================================================================

/// Whether a library belongs to a single user or to a group.
///
/// Determines the URL scope: `/users/{id}` or `/groups/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    User,
    Group,
}

impl LibraryType {
    /// URL path segment for this scope.
    pub fn scope(&self) -> &'static str {
        match self {
            LibraryType::User => "users",
            LibraryType::Group => "groups",
        }
    }
}

impl std::fmt::Display for LibraryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryType::User => write!(f, "user"),
            LibraryType::Group => write!(f, "group"),
        }
    }
}

impl std::str::FromStr for LibraryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "users" => Ok(LibraryType::User),
            "group" | "groups" => Ok(LibraryType::Group),
            _ => Err(ValidationError::NotAllowed {
                field: "library_type".to_string(),
                allowed: vec!["user".to_string(), "group".to_string()],
            }),
        }
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Sync status of a library.
///
/// ## State Machine
/// ```text
/// ┌──────────┐  sync()   ┌──────────┐  success  ┌──────────┐
/// │ NOT_RUN  │ ────────► │ RUNNING  │ ────────► │    OK    │
/// └──────────┘           └────┬─────┘           └────┬─────┘
///                             │ failure              │ sync()
///                             ▼                      │
///                        ┌──────────┐                │
///                        │  ERROR   │ ◄──────────────┘ (via RUNNING)
///                        └──────────┘
/// ```
/// A reset clears only the version cursor; the state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    NotRun,
    Running,
    Ok,
    Error,
}

impl SyncState {
    /// Returns true if a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: SyncState) -> bool {
        matches!(
            (self, next),
            (SyncState::NotRun, SyncState::Running)
                | (SyncState::Ok, SyncState::Running)
                | (SyncState::Error, SyncState::Running)
                // A crashed process leaves RUNNING behind; the next run restarts it.
                | (SyncState::Running, SyncState::Running)
                | (SyncState::Running, SyncState::Ok)
                | (SyncState::Running, SyncState::Error)
        )
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::NotRun => write!(f, "NOT_RUN"),
            SyncState::Running => write!(f, "RUNNING"),
            SyncState::Ok => write!(f, "OK"),
            SyncState::Error => write!(f, "ERROR"),
        }
    }
}

// =============================================================================
// Library
// =============================================================================

/// One remote bibliography endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Library {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display title, used to key error messages.
    pub title: String,

    /// User or group scope.
    pub library_type: LibraryType,

    /// Numeric id assigned upstream (kept as text).
    pub remote_id: String,

    /// API key sent with every request for this library.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Citation style identifier (may be a placeholder).
    pub citation_style: String,

    /// Citation locale, e.g. `en-US`.
    pub citation_locale: String,

    /// Minutes between scheduled syncs.
    pub sync_interval_minutes: i64,

    pub last_synced_at: Option<DateTime<Utc>>,

    pub last_sync_status: SyncState,

    pub last_sync_error: Option<String>,

    /// Version cursor for incremental fetches. `None` forces a full fetch.
    pub last_version: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Library {
    /// Path prefix for every request against this library.
    pub fn base_path(&self) -> String {
        format!("/{}/{}", self.library_type.scope(), self.remote_id)
    }

    /// Returns true if the library should be synced at `now`.
    ///
    /// Never-synced libraries are always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_synced_at {
            None => true,
            Some(last) => last + Duration::minutes(self.sync_interval_minutes.max(0)) <= now,
        }
    }
}

/// Administrator input for registering or editing a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLibrary {
    pub title: String,
    pub library_type: LibraryType,
    pub remote_id: String,
    pub api_key: String,
    #[serde(default)]
    pub citation_style: String,
    #[serde(default)]
    pub citation_locale: String,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: i64,
}

fn default_sync_interval() -> i64 {
    60
}

// =============================================================================
// Collection
// =============================================================================

/// A remote folder. The hierarchy is a forest per library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Collection {
    pub id: String,
    pub library_id: String,
    pub remote_key: String,
    /// `None` means root.
    pub parent_id: Option<String>,
    pub title: String,
    /// Locally curated; never rewritten by sync.
    pub published: bool,
    pub remote_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Item
// =============================================================================

/// A bibliographic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub library_id: String,
    pub remote_key: String,
    pub title: String,
    pub item_type: String,
    /// First 19xx/20xx run of `date`, or empty.
    pub year: String,
    pub date: String,
    pub publication_title: String,
    pub citation_html: String,
    pub bibtex: String,
    /// Full raw metadata as returned upstream.
    pub raw_data: serde_json::Value,
    pub tags: Vec<String>,
    pub remote_version: i64,
    /// Locally curated; never rewritten by sync.
    pub published: bool,
    pub in_trash: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the sync engine knows about an item before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub library_id: String,
    pub remote_key: String,
    pub title: String,
    pub item_type: String,
    pub year: String,
    pub date: String,
    pub publication_title: String,
    pub citation_html: String,
    pub bibtex: String,
    pub raw_data: serde_json::Value,
    pub tags: Vec<String>,
    pub creators: Vec<RemoteCreator>,
    pub abstract_note: String,
    pub remote_version: i64,
    pub in_trash: bool,
}

/// One entry of an item's remote creator list, in remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCreator {
    pub first_name: String,
    pub last_name: String,
    pub creator_type: String,
}

impl RemoteCreator {
    /// Display form used for search folding.
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, _) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

// =============================================================================
// Creators & Authors
// =============================================================================

/// A local author identity, curated by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Author {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Curated mapping of a remote (first, last) name pair to a local author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CreatorMapping {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Attachments
// =============================================================================

/// Attachment metadata. File bytes are streamed from upstream on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemAttachment {
    pub id: String,
    pub item_id: String,
    pub remote_key: String,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub link_mode: String,
    pub url: String,
    pub remote_version: i64,
}

/// Attachment metadata before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDraft {
    pub remote_key: String,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub link_mode: String,
    pub url: String,
    pub remote_version: i64,
}

// =============================================================================
// Upsert Outcome
// =============================================================================

/// Result of a conflict-aware upsert keyed by (library, remote_key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// Local id of the row (new or existing).
    pub id: String,
    /// True if the row did not exist before.
    pub created: bool,
}
