//! # Item Repository
//!
//! Item upserts keyed by (library, remote_key).
//!
//! ## Folded Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ItemDraft field                  column               folded via      │
//! │  ───────────────────────────────  ───────────────────  ─────────────── │
//! │  title                            title_folded         fold            │
//! │  creators (display names)         creators_folded      fold            │
//! │  publication_title                publication_folded   fold            │
//! │  tags                             tags_folded          fold            │
//! │  abstract_note                    abstract_folded      fold            │
//! │  citation_html                    citation_folded      strip_html+fold │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The search engine matches tokens against these with `instr`, so they are
//! rewritten on every upsert.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use super::generate_id;
use crate::error::{DbError, DbResult};
use bibmirror_core::metadata::{self, fold, strip_html};
use bibmirror_core::{Item, ItemDraft, RemoteCreator, Upserted};

const ITEM_COLUMNS: &str = r#"
    id, library_id, remote_key, title, item_type, year, date, publication_title,
    citation_html, bibtex, raw_data, tags, remote_version, published, in_trash,
    created_at, updated_at
"#;

/// Repository for item rows.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

/// Decodes an item row, parsing the JSON columns.
pub(crate) fn item_from_row(row: &SqliteRow) -> DbResult<Item> {
    let raw_data: String = row.try_get("raw_data")?;
    let tags: String = row.try_get("tags")?;

    Ok(Item {
        id: row.try_get("id")?,
        library_id: row.try_get("library_id")?,
        remote_key: row.try_get("remote_key")?,
        title: row.try_get("title")?,
        item_type: row.try_get("item_type")?,
        year: row.try_get("year")?,
        date: row.try_get("date")?,
        publication_title: row.try_get("publication_title")?,
        citation_html: row.try_get("citation_html")?,
        bibtex: row.try_get("bibtex")?,
        raw_data: serde_json::from_str(&raw_data)?,
        tags: serde_json::from_str(&tags)?,
        remote_version: row.try_get("remote_version")?,
        published: row.try_get("published")?,
        in_trash: row.try_get("in_trash")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn creators_text(creators: &[RemoteCreator]) -> String {
    creators
        .iter()
        .map(RemoteCreator::display_name)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Inserts or updates the item for (library, remote_key).
    ///
    /// Existing rows keep their id, `created_at` and curated `published`
    /// flag; every synced column and every folded column is rewritten.
    pub async fn upsert(&self, draft: &ItemDraft) -> DbResult<Upserted> {
        let candidate = generate_id();
        let now = Utc::now();
        let raw_data = serde_json::to_string(&draft.raw_data)?;
        let tags = serde_json::to_string(&draft.tags)?;

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO items (
                id, library_id, remote_key, title, item_type, year, date,
                publication_title, citation_html, bibtex, raw_data, tags,
                remote_version, in_trash,
                title_folded, creators_folded, publication_folded,
                tags_folded, abstract_folded, citation_folded,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14,
                ?15, ?16, ?17,
                ?18, ?19, ?20,
                ?21, ?21
            )
            ON CONFLICT (library_id, remote_key) DO UPDATE SET
                title = excluded.title,
                item_type = excluded.item_type,
                year = excluded.year,
                date = excluded.date,
                publication_title = excluded.publication_title,
                citation_html = excluded.citation_html,
                bibtex = excluded.bibtex,
                raw_data = excluded.raw_data,
                tags = excluded.tags,
                remote_version = excluded.remote_version,
                in_trash = excluded.in_trash,
                title_folded = excluded.title_folded,
                creators_folded = excluded.creators_folded,
                publication_folded = excluded.publication_folded,
                tags_folded = excluded.tags_folded,
                abstract_folded = excluded.abstract_folded,
                citation_folded = excluded.citation_folded,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&candidate)
        .bind(&draft.library_id)
        .bind(&draft.remote_key)
        .bind(&draft.title)
        .bind(&draft.item_type)
        .bind(&draft.year)
        .bind(&draft.date)
        .bind(&draft.publication_title)
        .bind(&draft.citation_html)
        .bind(&draft.bibtex)
        .bind(raw_data)
        .bind(tags)
        .bind(draft.remote_version)
        .bind(draft.in_trash)
        .bind(fold(&draft.title))
        .bind(fold(&creators_text(&draft.creators)))
        .bind(fold(&draft.publication_title))
        .bind(fold(&draft.tags.join(" ")))
        .bind(fold(&draft.abstract_note))
        .bind(fold(&strip_html(&draft.citation_html)))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let created = id == candidate;
        debug!(remote_key = %draft.remote_key, created, "Upserted item");
        Ok(Upserted { id, created })
    }

    pub async fn get(&self, id: &str) -> DbResult<Item> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;
        item_from_row(&row)
    }

    pub async fn get_by_key(&self, library_id: &str, remote_key: &str) -> DbResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE library_id = ?1 AND remote_key = ?2");
        let row = sqlx::query(&sql)
            .bind(library_id)
            .bind(remote_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    /// Remote key → local id for every item of a library.
    pub async fn key_map(&self, library_id: &str) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT remote_key, id FROM items WHERE library_id = ?1")
                .bind(library_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Creator lists of every item in a library, parsed from raw metadata.
    pub async fn creator_lists(&self, library_id: &str) -> DbResult<Vec<(String, Vec<RemoteCreator>)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, raw_data FROM items WHERE library_id = ?1 AND raw_data != '{}' ORDER BY remote_key",
        )
        .bind(library_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, raw)| -> DbResult<(String, Vec<RemoteCreator>)> {
                let data: serde_json::Value = serde_json::from_str(&raw)?;
                Ok((id, metadata::creators(&data)))
            })
            .collect()
    }

    /// Sets the locally curated published flag.
    pub async fn set_published(&self, id: &str, published: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET published = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(published)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }
        Ok(())
    }

    /// Deletes the items with the given remote keys; links and attachments
    /// cascade.
    pub async fn delete_by_keys(&self, library_id: &str, keys: &[String]) -> DbResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM items WHERE library_id = ");
        builder.push_bind(library_id);
        builder.push(" AND remote_key IN (");
        let mut separated = builder.separated(", ");
        for key in keys {
            separated.push_bind(key);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self, library_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE library_id = ?1")
            .bind(library_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
