//! # Sync Orchestrator
//!
//! Mirrors remote libraries into the local store, one library at a time.
//!
//! ## Per-Library Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SyncOrchestrator::sync()                            │
//! │                                                                         │
//! │  for each library (sequential, failures isolated):                     │
//! │                                                                         │
//! │   mark RUNNING                                                          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   1. Collections ── pages of 100 until a short page                     │
//! │      │              upsert with parent unset, remember parent keys      │
//! │      │              second pass: resolve parent keys → local ids        │
//! │      ▼                                                                  │
//! │   2. Deletions ──── incremental runs only: /deleted?since=N             │
//! │      ▼                                                                  │
//! │   3. Items ──────── items/top pages of 50 (since=N)                     │
//! │      │              per item: data+bib, bibtex, children                │
//! │      │              a failing item is logged and skipped                │
//! │      ▼                                                                  │
//! │   4. Collection ↔ item links (format=keys, insert missing)              │
//! │      ▼                                                                  │
//! │   5. Item ↔ creator links (assigned creator-map rows only)              │
//! │      ▼                                                                  │
//! │   mark OK with the newest Last-Modified-Version seen                    │
//! │                                                                         │
//! │   any error above ──► mark ERROR, append "title: error" to report       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version cursor is threaded through the stages as a return value and
//! only written when the whole library succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use bibmirror_core::metadata;
use bibmirror_core::validation::{is_placeholder_style, validate_page_size};
use bibmirror_core::{Library, NewLibrary};
use bibmirror_db::Database;

use crate::client::ApiClient;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::progress::{NoOpProgress, SyncProgress, SyncStage};
use crate::remote::{parse_keys, DeletedObjects, RemoteCollection, RemoteItem, RemoteItemDetail};

// =============================================================================
// Report
// =============================================================================

/// Counters for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped: u64,
}

impl EntityCounts {
    fn record(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.updated += 1;
        }
    }
}

/// Outcome of a [`SyncOrchestrator::sync`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub collections: EntityCounts,
    pub items: EntityCounts,
    pub collection_items: EntityCounts,
    pub item_creators: EntityCounts,
    pub attachments: EntityCounts,
    /// One `"<library title>: <error>"` entry per failed library.
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = [
            ("collections", &self.collections),
            ("items", &self.items),
            ("collection_items", &self.collection_items),
            ("item_creators", &self.item_creators),
            ("attachments", &self.attachments),
        ];
        for (name, c) in rows {
            writeln!(
                f,
                "{name:<17} created={} updated={} deleted={} skipped={}",
                c.created, c.updated, c.deleted, c.skipped
            )?;
        }
        for err in &self.errors {
            writeln!(f, "error: {err}")?;
        }
        Ok(())
    }
}

fn newest(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// A collection synced in this run: local id and remote key.
struct SyncedCollection {
    id: String,
    remote_key: String,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Pulls remote libraries into the local mirror.
pub struct SyncOrchestrator {
    db: Arc<Database>,
    client: ApiClient,
    settings: Arc<SyncSettings>,
    progress: Arc<dyn SyncProgress>,
}

impl SyncOrchestrator {
    pub fn new(db: Arc<Database>, client: ApiClient, settings: SyncSettings) -> Self {
        Self::with_progress(db, client, settings, Arc::new(NoOpProgress))
    }

    pub fn with_progress(
        db: Arc<Database>,
        client: ApiClient,
        settings: SyncSettings,
        progress: Arc<dyn SyncProgress>,
    ) -> Self {
        SyncOrchestrator {
            db,
            client,
            settings: Arc::new(settings),
            progress,
        }
    }

    /// Registers (or updates) administrator-declared libraries.
    pub async fn register_libraries(&self, libraries: &[NewLibrary]) -> SyncResult<Vec<Library>> {
        let mut registered = Vec::with_capacity(libraries.len());
        for library in libraries {
            registered.push(self.db.libraries().register(library).await?);
        }
        Ok(registered)
    }

    /// Clears a library's version cursor; the next run is a full fetch.
    pub async fn reset(&self, library_id: &str) -> SyncResult<()> {
        self.db.libraries().reset_version(library_id).await?;
        Ok(())
    }

    /// Syncs one library, or all of them when `library_id` is `None`.
    ///
    /// Never fails: problems end up in [`SyncReport::errors`].
    pub async fn sync(&self, library_id: Option<&str>) -> SyncReport {
        let libraries = match library_id {
            Some(id) => self.db.libraries().get(id).await.map(|library| vec![library]),
            None => self.db.libraries().list().await,
        };

        match libraries {
            Ok(libraries) => self.run(libraries).await,
            Err(e) => {
                error!(error = %e, "Failed to load libraries");
                SyncReport {
                    errors: vec![format!("{}: {}", library_id.unwrap_or("libraries"), e)],
                    ..Default::default()
                }
            }
        }
    }

    /// Syncs only the libraries whose interval has elapsed at `now`.
    pub async fn sync_due(&self, now: DateTime<Utc>) -> SyncReport {
        match self.db.libraries().list_due(now).await {
            Ok(libraries) => self.run(libraries).await,
            Err(e) => {
                error!(error = %e, "Failed to load due libraries");
                SyncReport {
                    errors: vec![format!("libraries: {e}")],
                    ..Default::default()
                }
            }
        }
    }

    async fn run(&self, libraries: Vec<Library>) -> SyncReport {
        let mut report = SyncReport::default();

        for library in libraries {
            info!(library = %library.title, path = %library.base_path(), "Syncing library");
            self.progress.library_started(&library);

            let outcome = match self.sync_library(&library, &mut report).await {
                Ok(version) => self
                    .db
                    .libraries()
                    .mark_ok(&library.id, version)
                    .await
                    .map_err(SyncError::from),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    info!(library = %library.title, "Library synced");
                    self.progress.library_finished(&library, None);
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(library = %library.title, error = %message, "Library sync failed");
                    if let Err(mark_err) = self.db.libraries().mark_error(&library.id, &message).await {
                        warn!(library = %library.title, error = %mark_err, "Could not record sync error");
                    }
                    self.progress.library_finished(&library, Some(message.as_str()));
                    report.errors.push(format!("{}: {}", library.title, message));
                }
            }
        }

        info!(
            collections = report.collections.created + report.collections.updated,
            items = report.items.created + report.items.updated,
            skipped = report.items.skipped,
            errors = report.errors.len(),
            "Sync finished"
        );
        report
    }

    /// Runs every stage for one library and returns the newest version seen.
    async fn sync_library(&self, library: &Library, report: &mut SyncReport) -> SyncResult<Option<i64>> {
        self.db.libraries().mark_running(&library.id).await?;

        self.progress.stage_started(library, SyncStage::Collections);
        let (collections, mut version) = self.sync_collections(library, report).await?;

        if let Some(since) = library.last_version {
            self.progress.stage_started(library, SyncStage::Deletions);
            version = newest(version, self.sync_deletions(library, since, report).await?);
        }

        self.progress.stage_started(library, SyncStage::Items);
        version = newest(version, self.sync_items(library, report).await?);

        self.progress.stage_started(library, SyncStage::CollectionLinks);
        self.sync_collection_links(library, &collections, report).await?;

        self.progress.stage_started(library, SyncStage::CreatorLinks);
        self.sync_creator_links(library, report).await?;

        Ok(version)
    }

    // =========================================================================
    // Collections
    // =========================================================================

    async fn sync_collections(
        &self,
        library: &Library,
        report: &mut SyncReport,
    ) -> SyncResult<(Vec<SyncedCollection>, Option<i64>)> {
        let path = format!("{}/collections", library.base_path());
        let limit = self.settings.collection_page_size.max(1);
        let repo = self.db.collections();

        let mut synced = Vec::new();
        let mut parents: Vec<(String, Option<String>)> = Vec::new();
        let mut version = None;
        let mut start = 0i64;

        loop {
            let query = [("start", start.to_string()), ("limit", limit.to_string())];
            let (page, page_version): (Vec<RemoteCollection>, _) =
                self.client.get_json(&path, &library.api_key, &query).await?;
            version = newest(version, page_version);

            for remote in &page {
                let upserted = repo
                    .upsert(&library.id, &remote.key, remote.data.name.trim(), remote.version)
                    .await?;
                report.collections.record(upserted.created);

                parents.push((
                    upserted.id.clone(),
                    remote.data.parent_collection.key().map(str::to_string),
                ));
                synced.push(SyncedCollection {
                    id: upserted.id,
                    remote_key: remote.key.clone(),
                });
            }

            if (page.len() as i64) < limit {
                break;
            }
            start += page.len() as i64;
        }

        // Parents may appear after their children, so resolve once all pages are in.
        let ids = repo.key_map(&library.id).await?;
        for (id, parent_key) in &parents {
            let parent_id = parent_key.as_deref().and_then(|key| ids.get(key));
            if parent_key.is_some() && parent_id.is_none() {
                debug!(library = %library.title, parent = ?parent_key, "Unknown parent collection");
            }
            repo.set_parent(id, parent_id.map(String::as_str)).await?;
        }

        info!(library = %library.title, count = synced.len(), "Collections synced");
        Ok((synced, version))
    }

    // =========================================================================
    // Deletions
    // =========================================================================

    async fn sync_deletions(&self, library: &Library, since: i64, report: &mut SyncReport) -> SyncResult<Option<i64>> {
        let path = format!("{}/deleted", library.base_path());
        let (deleted, version): (DeletedObjects, _) = self
            .client
            .get_json(&path, &library.api_key, &[("since", since.to_string())])
            .await?;

        if !deleted.is_empty() {
            report.items.deleted += self.db.items().delete_by_keys(&library.id, &deleted.items).await?;
            report.collections.deleted += self
                .db
                .collections()
                .delete_by_keys(&library.id, &deleted.collections)
                .await?;
            info!(
                library = %library.title,
                items = deleted.items.len(),
                collections = deleted.collections.len(),
                "Applied remote deletions"
            );
        }

        Ok(version)
    }

    // =========================================================================
    // Items
    // =========================================================================

    async fn sync_items(&self, library: &Library, report: &mut SyncReport) -> SyncResult<Option<i64>> {
        let path = format!("{}/items/top", library.base_path());
        let limit = self.settings.item_page_size.max(1);

        let mut version = None;
        let mut start = 0i64;

        loop {
            let mut query = vec![("start", start.to_string()), ("limit", limit.to_string())];
            if let Some(since) = library.last_version {
                query.push(("since", since.to_string()));
            }

            let (page, page_version): (Vec<RemoteItem>, _) =
                self.client.get_json(&path, &library.api_key, &query).await?;
            version = newest(version, page_version);

            for remote in &page {
                match self.sync_item(library, remote, report).await {
                    Ok(()) => self.progress.item_processed(library, &remote.key, false),
                    Err(e) => {
                        warn!(
                            library = %library.title,
                            key = %remote.key,
                            path = %format!("{}/items/{}", library.base_path(), remote.key),
                            error = %e,
                            "Skipping item"
                        );
                        report.items.skipped += 1;
                        self.progress.item_processed(library, &remote.key, true);
                    }
                }
            }

            if (page.len() as i64) < limit {
                break;
            }
            start += page.len() as i64;
        }

        Ok(version)
    }

    async fn sync_item(&self, library: &Library, remote: &RemoteItem, report: &mut SyncReport) -> SyncResult<()> {
        let path = format!("{}/items/{}", library.base_path(), remote.key);

        let mut query = vec![("include", "data,bib".to_string())];
        if !is_placeholder_style(&library.citation_style, self.settings.placeholder_styles.as_slice()) {
            query.push(("style", library.citation_style.trim().to_string()));
        }
        if !library.citation_locale.trim().is_empty() {
            query.push(("locale", library.citation_locale.trim().to_string()));
        }

        let (detail, _): (RemoteItemDetail, _) = self.client.get_json(&path, &library.api_key, &query).await?;
        let bibtex = self
            .client
            .get_text(&path, &library.api_key, &[("format", "bibtex".to_string())])
            .await?;

        let data = match detail.data {
            Value::Null => remote.data.clone(),
            data => data,
        };
        let draft = metadata::draft_item(
            &library.id,
            &remote.key,
            detail.version.max(remote.version),
            data,
            detail.bib,
            bibtex,
        );

        let upserted = self.db.items().upsert(&draft).await?;
        report.items.record(upserted.created);

        if self.settings.fetch_attachments {
            if let Err(e) = self.sync_attachments(library, &path, &upserted.id, report).await {
                warn!(library = %library.title, key = %remote.key, error = %e, "Attachment fetch failed");
                report.attachments.skipped += 1;
            }
        }

        Ok(())
    }

    async fn sync_attachments(
        &self,
        library: &Library,
        item_path: &str,
        item_id: &str,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let path = format!("{item_path}/children");
        let (children, _): (Vec<RemoteItem>, _) = self.client.get_json(&path, &library.api_key, &[]).await?;

        for child in &children {
            if let Some(draft) = metadata::draft_attachment(&child.key, child.version, &child.data) {
                let upserted = self.db.attachments().upsert(item_id, &draft).await?;
                report.attachments.record(upserted.created);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Links
    // =========================================================================

    async fn sync_collection_links(
        &self,
        library: &Library,
        collections: &[SyncedCollection],
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let items = self.db.items().key_map(&library.id).await?;
        let links = self.db.links();
        let limit = self.settings.member_page_size.max(1);

        for collection in collections {
            let path = format!("{}/collections/{}/items", library.base_path(), collection.remote_key);
            let mut start = 0i64;

            loop {
                let query = [
                    ("format", "keys".to_string()),
                    ("start", start.to_string()),
                    ("limit", limit.to_string()),
                ];
                let body = self.client.get_text(&path, &library.api_key, &query).await?;
                let keys = parse_keys(&body);

                for key in &keys {
                    match items.get(key) {
                        Some(item_id) => {
                            if links.link_collection_item(&collection.id, item_id).await? {
                                report.collection_items.created += 1;
                            }
                        }
                        // Child notes/attachments and items outside the mirror.
                        None => report.collection_items.skipped += 1,
                    }
                }

                if (keys.len() as i64) < limit {
                    break;
                }
                start += keys.len() as i64;
            }
        }

        Ok(())
    }

    async fn sync_creator_links(&self, library: &Library, report: &mut SyncReport) -> SyncResult<()> {
        let creators = self.db.creators();
        let links = self.db.links();
        let mut assigned: HashMap<(String, String), Option<String>> = HashMap::new();

        for (item_id, item_creators) in self.db.items().creator_lists(&library.id).await? {
            for (index, creator) in item_creators.iter().enumerate() {
                let name = (creator.first_name.clone(), creator.last_name.clone());
                let mapping_id = match assigned.get(&name) {
                    Some(cached) => cached.clone(),
                    None => {
                        let found = creators
                            .find_assigned(&creator.first_name, &creator.last_name)
                            .await?
                            .map(|mapping| mapping.id);
                        assigned.insert(name, found.clone());
                        found
                    }
                };

                if let Some(mapping_id) = mapping_id {
                    if links.link_item_creator(&item_id, &mapping_id, index as i64).await? {
                        report.item_creators.created += 1;
                    }
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for a [`SyncOrchestrator`].
pub struct SyncOrchestratorBuilder {
    settings: SyncSettings,
    db: Option<Arc<Database>>,
    client: Option<ApiClient>,
    progress: Option<Arc<dyn SyncProgress>>,
}

impl SyncOrchestratorBuilder {
    pub fn new(settings: SyncSettings) -> Self {
        SyncOrchestratorBuilder {
            settings,
            db: None,
            client: None,
            progress: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_client(mut self, client: ApiClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn SyncProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(self) -> SyncResult<SyncOrchestrator> {
        let db = self
            .db
            .ok_or_else(|| SyncError::InvalidConfig("Database required".into()))?;
        let client = self
            .client
            .ok_or_else(|| SyncError::InvalidConfig("API client required".into()))?;
        let progress = self.progress.unwrap_or_else(|| Arc::new(NoOpProgress));

        validate_page_size("collection_page_size", self.settings.collection_page_size)?;
        validate_page_size("item_page_size", self.settings.item_page_size)?;
        validate_page_size("member_page_size", self.settings.member_page_size)?;

        Ok(SyncOrchestrator::with_progress(db, client, self.settings, progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest() {
        assert_eq!(newest(None, None), None);
        assert_eq!(newest(Some(3), None), Some(3));
        assert_eq!(newest(None, Some(4)), Some(4));
        assert_eq!(newest(Some(9), Some(4)), Some(9));
    }

    #[test]
    fn test_counts_record() {
        let mut counts = EntityCounts::default();
        counts.record(true);
        counts.record(false);
        counts.record(false);
        assert_eq!(counts.created, 1);
        assert_eq!(counts.updated, 2);
    }

    #[test]
    fn test_builder_requires_database() {
        let client = ApiClient::new(
            &crate::config::ApiSettings::default(),
            Arc::new(crate::client::testing::ScriptedTransport::default()),
        )
        .unwrap();

        let result = SyncOrchestratorBuilder::new(SyncSettings::default())
            .with_client(client)
            .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_page_size() {
        let client = ApiClient::new(
            &crate::config::ApiSettings::default(),
            Arc::new(crate::client::testing::ScriptedTransport::default()),
        )
        .unwrap();
        let db = Arc::new(Database::new(bibmirror_db::DbConfig::in_memory()).await.unwrap());

        let settings = SyncSettings {
            item_page_size: 0,
            ..SyncSettings::default()
        };
        let result = SyncOrchestratorBuilder::new(settings)
            .with_database(db)
            .with_client(client)
            .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_report_display() {
        let mut report = SyncReport::default();
        report.items.created = 2;
        report.errors.push("Lab: API error".into());
        let text = report.to_string();
        assert!(text.contains("items             created=2"));
        assert!(text.contains("error: Lab: API error"));
        assert!(!report.is_success());
    }
}
