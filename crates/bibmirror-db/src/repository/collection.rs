//! # Collection Repository
//!
//! Upserts keyed by (library, remote_key) and the parent links resolved
//! after a library's full collection list has been fetched.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::generate_id;
use crate::error::DbResult;
use bibmirror_core::{Collection, Upserted};

const COLLECTION_COLUMNS: &str = r#"
    id, library_id, remote_key, parent_id, title, published, remote_version,
    created_at, updated_at
"#;

/// Repository for collection rows.
#[derive(Debug, Clone)]
pub struct CollectionRepository {
    pool: SqlitePool,
}

impl CollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CollectionRepository { pool }
    }

    /// Inserts or updates the collection for (library, remote_key).
    ///
    /// New rows start with no parent. Existing rows keep their parent and
    /// their locally curated `published` flag.
    pub async fn upsert(
        &self,
        library_id: &str,
        remote_key: &str,
        title: &str,
        remote_version: i64,
    ) -> DbResult<Upserted> {
        let candidate = generate_id();
        let now = Utc::now();

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO collections (
                id, library_id, remote_key, parent_id, title, remote_version,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?6)
            ON CONFLICT (library_id, remote_key) DO UPDATE SET
                title = excluded.title,
                remote_version = excluded.remote_version,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&candidate)
        .bind(library_id)
        .bind(remote_key)
        .bind(title)
        .bind(remote_version)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let created = id == candidate;
        debug!(remote_key = %remote_key, created, "Upserted collection");
        Ok(Upserted { id, created })
    }

    /// Sets (or clears) the parent of a collection.
    pub async fn set_parent(&self, id: &str, parent_id: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE collections SET parent_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remote key → local id for every collection of a library.
    pub async fn key_map(&self, library_id: &str) -> DbResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT remote_key, id FROM collections WHERE library_id = ?1")
                .bind(library_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn get_by_key(&self, library_id: &str, remote_key: &str) -> DbResult<Option<Collection>> {
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE library_id = ?1 AND remote_key = ?2"
        );
        let collection = sqlx::query_as::<_, Collection>(&sql)
            .bind(library_id)
            .bind(remote_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(collection)
    }

    /// All collections of a library, ordered by title.
    pub async fn list(&self, library_id: &str) -> DbResult<Vec<Collection>> {
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE library_id = ?1 ORDER BY title, remote_key"
        );
        let collections = sqlx::query_as::<_, Collection>(&sql)
            .bind(library_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(collections)
    }

    /// Sets the locally curated published flag.
    pub async fn set_published(&self, id: &str, published: bool) -> DbResult<()> {
        sqlx::query("UPDATE collections SET published = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(published)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes the collections with the given remote keys. Children become
    /// roots and memberships cascade.
    pub async fn delete_by_keys(&self, library_id: &str, keys: &[String]) -> DbResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM collections WHERE library_id = ");
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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE library_id = ?1")
            .bind(library_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::testing;

    #[tokio::test]
    async fn test_upsert_reports_created_once() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let repo = db.collections();

        let first = repo.upsert(&library.id, "COLL0001", "Papers", 3).await.unwrap();
        let second = repo.upsert(&library.id, "COLL0001", "Papers (renamed)", 4).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(repo.count(&library.id).await.unwrap(), 1);

        let stored = repo.get_by_key(&library.id, "COLL0001").await.unwrap().unwrap();
        assert_eq!(stored.title, "Papers (renamed)");
        assert_eq!(stored.remote_version, 4);
    }

    #[tokio::test]
    async fn test_same_key_in_two_libraries() {
        let db = testing::database().await;
        let a = testing::library(&db, "1").await;
        let b = testing::library(&db, "2").await;
        let repo = db.collections();

        let in_a = repo.upsert(&a.id, "SAMEKEY1", "A", 1).await.unwrap();
        let in_b = repo.upsert(&b.id, "SAMEKEY1", "B", 1).await.unwrap();
        assert!(in_a.created && in_b.created);
        assert_ne!(in_a.id, in_b.id);
    }

    #[tokio::test]
    async fn test_update_preserves_parent_and_published() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let repo = db.collections();

        let parent = repo.upsert(&library.id, "PARENT01", "Parent", 1).await.unwrap();
        let child = repo.upsert(&library.id, "CHILD001", "Child", 1).await.unwrap();
        repo.set_parent(&child.id, Some(parent.id.as_str())).await.unwrap();
        repo.set_published(&child.id, false).await.unwrap();

        repo.upsert(&library.id, "CHILD001", "Child v2", 2).await.unwrap();
        let stored = repo.get_by_key(&library.id, "CHILD001").await.unwrap().unwrap();
        assert_eq!(stored.parent_id.as_deref(), Some(parent.id.as_str()));
        assert!(!stored.published);
    }

    #[tokio::test]
    async fn test_delete_by_keys_orphans_children() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let repo = db.collections();

        let parent = repo.upsert(&library.id, "PARENT01", "Parent", 1).await.unwrap();
        let child = repo.upsert(&library.id, "CHILD001", "Child", 1).await.unwrap();
        repo.set_parent(&child.id, Some(parent.id.as_str())).await.unwrap();

        let deleted = repo
            .delete_by_keys(&library.id, &["PARENT01".to_string(), "NOPE".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let orphan = repo.get_by_key(&library.id, "CHILD001").await.unwrap().unwrap();
        assert_eq!(orphan.parent_id, None);
        assert_eq!(repo.key_map(&library.id).await.unwrap().len(), 1);
    }
}
