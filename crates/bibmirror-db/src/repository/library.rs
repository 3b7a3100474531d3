//! # Library Repository
//!
//! Registration of remote libraries and their sync bookkeeping.
//!
//! ## Sync State Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  mark_running(id)          status = running, error cleared             │
//! │       │                                                                 │
//! │       ├── ok ──► mark_ok(id, version)                                  │
//! │       │          status = ok, last_synced_at = now,                    │
//! │       │          last_version = version (kept if None)                 │
//! │       │                                                                 │
//! │       └── err ─► mark_error(id, message)                               │
//! │                  status = error, last_sync_error = message             │
//! │                                                                         │
//! │  reset_version(id)         last_version = NULL, nothing else           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::generate_id;
use crate::error::{DbError, DbResult};
use bibmirror_core::validation::validate_new_library;
use bibmirror_core::{CoreError, Library, NewLibrary, SyncState};

const LIBRARY_COLUMNS: &str = r#"
    id, title, library_type, remote_id, api_key, citation_style, citation_locale,
    sync_interval_minutes, last_synced_at, last_sync_status, last_sync_error,
    last_version, created_at, updated_at
"#;

/// Repository for library rows.
#[derive(Debug, Clone)]
pub struct LibraryRepository {
    pool: SqlitePool,
}

impl LibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LibraryRepository { pool }
    }

    /// Registers a library, or updates the administrator-editable fields of
    /// the library already registered for the same (type, remote id).
    ///
    /// Sync state and the version cursor are left alone on update.
    pub async fn register(&self, library: &NewLibrary) -> DbResult<Library> {
        validate_new_library(library).map_err(CoreError::from)?;

        debug!(
            library_type = %library.library_type,
            remote_id = %library.remote_id,
            "Registering library"
        );

        let now = Utc::now();
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO libraries (
                id, title, library_type, remote_id, api_key,
                citation_style, citation_locale, sync_interval_minutes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT (library_type, remote_id) DO UPDATE SET
                title = excluded.title,
                api_key = excluded.api_key,
                citation_style = excluded.citation_style,
                citation_locale = excluded.citation_locale,
                sync_interval_minutes = excluded.sync_interval_minutes,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(generate_id())
        .bind(library.title.trim())
        .bind(library.library_type)
        .bind(library.remote_id.trim())
        .bind(library.api_key.trim())
        .bind(library.citation_style.trim())
        .bind(library.citation_locale.trim())
        .bind(library.sync_interval_minutes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.get(&id).await
    }

    /// Gets a library by local id.
    pub async fn get(&self, id: &str) -> DbResult<Library> {
        let sql = format!("SELECT {LIBRARY_COLUMNS} FROM libraries WHERE id = ?1");
        sqlx::query_as::<_, Library>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Library", id))
    }

    /// All libraries, ordered by title.
    pub async fn list(&self) -> DbResult<Vec<Library>> {
        let sql = format!("SELECT {LIBRARY_COLUMNS} FROM libraries ORDER BY title, id");
        let libraries = sqlx::query_as::<_, Library>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(libraries)
    }

    /// Libraries whose sync interval has elapsed at `now`.
    pub async fn list_due(&self, now: DateTime<Utc>) -> DbResult<Vec<Library>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|library| library.is_due(now))
            .collect())
    }

    async fn transition(&self, id: &str, next: SyncState) -> DbResult<()> {
        let current: SyncState =
            sqlx::query_scalar("SELECT last_sync_status FROM libraries WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Library", id))?;

        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                library_id: id.to_string(),
                from: current.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Marks a library as syncing and clears the previous error.
    pub async fn mark_running(&self, id: &str) -> DbResult<()> {
        self.transition(id, SyncState::Running).await?;

        sqlx::query(
            r#"
            UPDATE libraries
            SET last_sync_status = ?2, last_sync_error = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncState::Running)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a successful run. A `None` version keeps the previous cursor.
    pub async fn mark_ok(&self, id: &str, version: Option<i64>) -> DbResult<()> {
        self.transition(id, SyncState::Ok).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE libraries
            SET last_sync_status = ?2,
                last_sync_error = NULL,
                last_synced_at = ?3,
                last_version = COALESCE(?4, last_version),
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncState::Ok)
        .bind(now)
        .bind(version)
        .execute(&self.pool)
        .await?;

        info!(library_id = %id, version = ?version, "Library sync recorded");
        Ok(())
    }

    /// Records a failed run with its error message.
    pub async fn mark_error(&self, id: &str, message: &str) -> DbResult<()> {
        self.transition(id, SyncState::Error).await?;

        sqlx::query(
            r#"
            UPDATE libraries
            SET last_sync_status = ?2, last_sync_error = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncState::Error)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clears the version cursor so the next run fetches everything.
    pub async fn reset_version(&self, id: &str) -> DbResult<()> {
        info!(library_id = %id, "Resetting library version cursor");

        let result = sqlx::query("UPDATE libraries SET last_version = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Library", id));
        }
        Ok(())
    }

    /// Removes a library and, through cascades, everything mirrored from it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Library", id));
        }
        Ok(())
    }
}
