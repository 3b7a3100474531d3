//! # Attachment Repository
//!
//! Attachment metadata only. File bytes are never stored; callers stream
//! them from upstream by remote key.

use sqlx::SqlitePool;

use super::generate_id;
use crate::error::{DbError, DbResult};
use bibmirror_core::{AttachmentDraft, ItemAttachment, Upserted};

const ATTACHMENT_COLUMNS: &str =
    "id, item_id, remote_key, title, filename, content_type, link_mode, url, remote_version";

#[derive(Debug, Clone)]
pub struct AttachmentRepository {
    pool: SqlitePool,
}

impl AttachmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AttachmentRepository { pool }
    }

    /// Inserts or updates the attachment for (item, remote_key).
    pub async fn upsert(&self, item_id: &str, draft: &AttachmentDraft) -> DbResult<Upserted> {
        let candidate = generate_id();

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO item_attachments (
                id, item_id, remote_key, title, filename, content_type,
                link_mode, url, remote_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (item_id, remote_key) DO UPDATE SET
                title = excluded.title,
                filename = excluded.filename,
                content_type = excluded.content_type,
                link_mode = excluded.link_mode,
                url = excluded.url,
                remote_version = excluded.remote_version
            RETURNING id
            "#,
        )
        .bind(&candidate)
        .bind(item_id)
        .bind(&draft.remote_key)
        .bind(&draft.title)
        .bind(&draft.filename)
        .bind(&draft.content_type)
        .bind(&draft.link_mode)
        .bind(&draft.url)
        .bind(draft.remote_version)
        .fetch_one(&self.pool)
        .await?;

        let created = id == candidate;
        Ok(Upserted { id, created })
    }

    pub async fn get(&self, id: &str) -> DbResult<ItemAttachment> {
        let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM item_attachments WHERE id = ?1");
        sqlx::query_as::<_, ItemAttachment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Attachment", id))
    }

    pub async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<ItemAttachment>> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM item_attachments WHERE item_id = ?1 ORDER BY title, remote_key"
        );
        let attachments = sqlx::query_as::<_, ItemAttachment>(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(attachments)
    }
}
