//! # Creator Repository
//!
//! The curated creator map and the local author identities it points to.
//! Sync only reads this table; administrators write it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::generate_id;
use crate::error::{DbError, DbResult};
use bibmirror_core::{Author, CreatorMapping};

/// Repository for `creator_map` and `authors`.
#[derive(Debug, Clone)]
pub struct CreatorRepository {
    pool: SqlitePool,
}

impl CreatorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreatorRepository { pool }
    }

    /// Creates a local author identity.
    pub async fn create_author(&self, name: &str) -> DbResult<Author> {
        let author = Author {
            id: generate_id(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO authors (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&author.id)
            .bind(&author.name)
            .bind(author.created_at)
            .execute(&self.pool)
            .await?;

        Ok(author)
    }

    pub async fn list_authors(&self) -> DbResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT id, name, created_at FROM authors ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    /// Authors with at least one creator-map linkage, for filter pickers.
    pub async fn linked_authors(&self) -> DbResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT a.id, a.name, a.created_at
            FROM authors a
            WHERE EXISTS (SELECT 1 FROM creator_map cm WHERE cm.author_id = a.id)
            ORDER BY a.name, a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    /// Returns the mapping for an exact (first, last) pair, creating an
    /// unassigned one if none exists.
    pub async fn ensure_mapping(&self, first_name: &str, last_name: &str) -> DbResult<CreatorMapping> {
        debug!(first_name, last_name, "Ensuring creator mapping");

        sqlx::query(
            r#"
            INSERT INTO creator_map (id, first_name, last_name, author_id, created_at)
            VALUES (?1, ?2, ?3, NULL, ?4)
            ON CONFLICT (first_name, last_name) DO NOTHING
            "#,
        )
        .bind(generate_id())
        .bind(first_name)
        .bind(last_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let mapping = sqlx::query_as::<_, CreatorMapping>(
            r#"
            SELECT id, first_name, last_name, author_id, created_at
            FROM creator_map WHERE first_name = ?1 AND last_name = ?2
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(mapping)
    }

    /// Points a mapping at a local author, or detaches it with `None`.
    pub async fn assign(&self, mapping_id: &str, author_id: Option<&str>) -> DbResult<()> {
        let result = sqlx::query("UPDATE creator_map SET author_id = ?2 WHERE id = ?1")
            .bind(mapping_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreatorMapping", mapping_id));
        }
        Ok(())
    }

    /// The mapping for an exact (first, last) pair, only if it already has
    /// a local author assigned.
    pub async fn find_assigned(&self, first_name: &str, last_name: &str) -> DbResult<Option<CreatorMapping>> {
        let mapping = sqlx::query_as::<_, CreatorMapping>(
            r#"
            SELECT id, first_name, last_name, author_id, created_at
            FROM creator_map
            WHERE first_name = ?1 AND last_name = ?2 AND author_id IS NOT NULL
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(mapping)
    }

    pub async fn list_mappings(&self) -> DbResult<Vec<CreatorMapping>> {
        let mappings = sqlx::query_as::<_, CreatorMapping>(
            r#"
            SELECT id, first_name, last_name, author_id, created_at
            FROM creator_map ORDER BY last_name, first_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(mappings)
    }
}
