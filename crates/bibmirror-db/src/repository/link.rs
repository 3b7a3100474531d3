//! # Link Repository
//!
//! Many-to-many link tables. Both are add-only during sync and nothing is
//! removed here. A re-linked creator takes the latest author position.

use sqlx::SqlitePool;

use super::generate_id;
use crate::error::DbResult;

/// Repository for `collection_items` and `item_creators`.
#[derive(Debug, Clone)]
pub struct LinkRepository {
    pool: SqlitePool,
}

impl LinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LinkRepository { pool }
    }

    /// Adds an item to a collection. Returns false if it was already there.
    pub async fn link_collection_item(&self, collection_id: &str, item_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO collection_items (collection_id, item_id) VALUES (?1, ?2)",
        )
        .bind(collection_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Links an item to a creator mapping at position `sorting`, moving an
    /// existing link to the new position. Returns false if the pair was
    /// already linked.
    pub async fn link_item_creator(&self, item_id: &str, creator_id: &str, sorting: i64) -> DbResult<bool> {
        let candidate = generate_id();

        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO item_creators (id, item_id, creator_id, sorting)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (item_id, creator_id) DO UPDATE SET
                sorting = excluded.sorting
            RETURNING id
            "#,
        )
        .bind(&candidate)
        .bind(item_id)
        .bind(creator_id)
        .bind(sorting)
        .fetch_one(&self.pool)
        .await?;

        Ok(id == candidate)
    }

    /// Item ids in a collection.
    pub async fn collection_item_ids(&self, collection_id: &str) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT item_id FROM collection_items WHERE collection_id = ?1 ORDER BY item_id",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// `(creator_id, sorting)` pairs of an item, in author order.
    pub async fn item_creators(&self, item_id: &str) -> DbResult<Vec<(String, i64)>> {
        let rows = sqlx::query_as(
            "SELECT creator_id, sorting FROM item_creators WHERE item_id = ?1 ORDER BY sorting",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::testing;

    #[tokio::test]
    async fn test_collection_links_are_unique() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let collection = db.collections().upsert(&library.id, "C1", "C", 1).await.unwrap();
        let item = db.items().upsert(&testing::draft(&library.id, "I1", "I")).await.unwrap();

        let links = db.links();
        assert!(links.link_collection_item(&collection.id, &item.id).await.unwrap());
        assert!(!links.link_collection_item(&collection.id, &item.id).await.unwrap());
        assert_eq!(links.collection_item_ids(&collection.id).await.unwrap(), vec![item.id]);
    }

    #[tokio::test]
    async fn test_item_creator_links_keep_order() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let item = db.items().upsert(&testing::draft(&library.id, "I1", "I")).await.unwrap();
        let first = db.creators().ensure_mapping("Ada", "Lovelace").await.unwrap();
        let second = db.creators().ensure_mapping("Charles", "Babbage").await.unwrap();

        let links = db.links();
        assert!(links.link_item_creator(&item.id, &second.id, 1).await.unwrap());
        assert!(links.link_item_creator(&item.id, &first.id, 0).await.unwrap());
        assert!(!links.link_item_creator(&item.id, &first.id, 0).await.unwrap());

        let ordered = links.item_creators(&item.id).await.unwrap();
        assert_eq!(ordered, vec![(first.id, 0), (second.id, 1)]);
    }

    #[tokio::test]
    async fn test_relinked_creator_takes_new_position() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let item = db.items().upsert(&testing::draft(&library.id, "I1", "I")).await.unwrap();
        let first = db.creators().ensure_mapping("Ada", "Lovelace").await.unwrap();
        let second = db.creators().ensure_mapping("Charles", "Babbage").await.unwrap();

        let links = db.links();
        links.link_item_creator(&item.id, &first.id, 0).await.unwrap();
        links.link_item_creator(&item.id, &second.id, 1).await.unwrap();

        // Authors swapped upstream.
        assert!(!links.link_item_creator(&item.id, &second.id, 0).await.unwrap());
        assert!(!links.link_item_creator(&item.id, &first.id, 1).await.unwrap());

        let ordered = links.item_creators(&item.id).await.unwrap();
        assert_eq!(ordered, vec![(second.id, 0), (first.id, 1)]);
    }
}
