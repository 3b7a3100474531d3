//! # Progress Reporting
//!
//! Hooks the orchestrator calls as it works through a library. Embedders
//! (an admin UI, a CLI spinner) implement [`SyncProgress`]; the default
//! methods do nothing.

use bibmirror_core::Library;

/// Stage of a single library's sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Collections,
    Deletions,
    Items,
    CollectionLinks,
    CreatorLinks,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::Collections => "collections",
            SyncStage::Deletions => "deletions",
            SyncStage::Items => "items",
            SyncStage::CollectionLinks => "collection links",
            SyncStage::CreatorLinks => "creator links",
        };
        f.write_str(name)
    }
}

/// Receives sync progress events.
pub trait SyncProgress: Send + Sync {
    fn library_started(&self, _library: &Library) {}

    fn stage_started(&self, _library: &Library, _stage: SyncStage) {}

    /// Called once per top-level item, whether stored or skipped.
    fn item_processed(&self, _library: &Library, _remote_key: &str, _skipped: bool) {}

    /// `error` is `None` on success.
    fn library_finished(&self, _library: &Library, _error: Option<&str>) {}
}

/// Progress sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgress;

impl SyncProgress for NoOpProgress {}
