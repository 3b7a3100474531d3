//! # Search Repository
//!
//! Weighted, multi-token search over mirrored items, computed entirely in
//! SQL without a dedicated index.
//!
//! ## Query Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SELECT ..., (t0 + t1 + ...) AS score                                  │
//! │  FROM (                                                                │
//! │      SELECT i.*,                                                       │
//! │        (CASE WHEN instr(title_folded, ?tok0) > 0 THEN w_title ELSE 0   │
//! │         + CASE WHEN instr(tags_folded,  ?tok0) > 0 THEN w_tags  ELSE 0 │
//! │         + ...) AS t0,                                                  │
//! │        (... same for tok1 ...) AS t1                                   │
//! │      FROM items i                                                      │
//! │      WHERE <library, published, author, year, type, citation>         │
//! │  )                                                                     │
//! │  WHERE t0 > 0 AND t1 > 0        -- AND mode                            │
//! │     or (t0 + t1) > 0            -- OR / single token / phrase          │
//! │  ORDER BY score DESC, title ASC                                        │
//! │  LIMIT ? OFFSET ?                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Filtering always precedes scoring. With no keywords the score column is
//! zero and results are ordered by title.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bibmirror_core::search::{SearchHit, SearchQuery};
use bibmirror_core::StopwordSource;

const HIT_COLUMNS: &str = r#"
    i.id, i.library_id, i.remote_key, i.title, i.year, i.date,
    i.publication_title, i.item_type, i.citation_html, i.raw_data
"#;

#[derive(Debug, Clone)]
pub struct SearchRepository {
    pool: SqlitePool,
}

fn hit_from_row(row: &SqliteRow) -> DbResult<SearchHit> {
    let raw_data: String = row.try_get("raw_data")?;
    Ok(SearchHit {
        id: row.try_get("id")?,
        library_id: row.try_get("library_id")?,
        remote_key: row.try_get("remote_key")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        date: row.try_get("date")?,
        publication_title: row.try_get("publication_title")?,
        item_type: row.try_get("item_type")?,
        citation_html: row.try_get("citation_html")?,
        raw_data: serde_json::from_str(&raw_data)?,
        score: row.try_get("score")?,
    })
}

/// Appends the WHERE clause shared by every search regime.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &SearchQuery) {
    builder.push(" WHERE i.published = 1 AND i.in_trash = 0 AND i.library_id IN (");
    let mut libraries = builder.separated(", ");
    for id in &query.library_ids {
        libraries.push_bind(id.clone());
    }
    libraries.push_unseparated(")");

    if let Some(author_id) = &query.author_id {
        builder.push(
            " AND EXISTS (SELECT 1 FROM item_creators ic \
             JOIN creator_map cm ON cm.id = ic.creator_id \
             WHERE ic.item_id = i.id AND cm.author_id = ",
        );
        builder.push_bind(author_id.clone());
        builder.push(")");
    }

    if query.year_from.is_some() || query.year_to.is_some() {
        // Only well-formed 19xx/20xx years take part in range filtering.
        builder.push(" AND (i.year GLOB '19[0-9][0-9]' OR i.year GLOB '20[0-9][0-9]')");
        if let Some(from) = query.year_from {
            builder.push(" AND CAST(i.year AS INTEGER) >= ");
            builder.push_bind(from);
        }
        if let Some(to) = query.year_to {
            builder.push(" AND CAST(i.year AS INTEGER) <= ");
            builder.push_bind(to);
        }
    }

    if let Some(types) = &query.item_types {
        builder.push(" AND i.item_type IN (");
        let mut separated = builder.separated(", ");
        for item_type in types {
            separated.push_bind(item_type.clone());
        }
        separated.push_unseparated(")");
    }

    if query.require_citation {
        builder.push(" AND i.citation_html != ''");
    }
}

impl SearchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SearchRepository { pool }
    }

    /// Runs a search and returns hits ordered by score, then title.
    ///
    /// Returns nothing when no library is selected or when the item-type
    /// filter is present but empty.
    pub async fn search(&self, query: &SearchQuery, stopwords: &dyn StopwordSource) -> DbResult<Vec<SearchHit>> {
        if query.library_ids.is_empty() {
            return Ok(Vec::new());
        }
        if matches!(&query.item_types, Some(types) if types.is_empty()) {
            return Ok(Vec::new());
        }

        let plan = query.plan(stopwords);
        let limit = query.max_results.max(1);
        let offset = query.offset.max(0);

        debug!(
            tokens = ?plan.tokens,
            mode = ?plan.mode,
            libraries = query.library_ids.len(),
            "Searching items"
        );

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("");

        if plan.tokens.is_empty() {
            builder.push(format!("SELECT {HIT_COLUMNS}, 0 AS score FROM items i"));
            push_filters(&mut builder, query);
            builder.push(" ORDER BY i.title ASC, i.id ASC");
        } else {
            let token_columns: Vec<String> =
                (0..plan.tokens.len()).map(|i| format!("t{i}")).collect();

            builder.push(format!(
                "SELECT id, library_id, remote_key, title, year, date, publication_title, \
                 item_type, citation_html, raw_data, ({}) AS score FROM (SELECT {HIT_COLUMNS}",
                token_columns.join(" + ")
            ));

            for (index, token) in plan.tokens.iter().enumerate() {
                builder.push(", (0");
                for (field, weight) in query.weights.iter() {
                    builder.push(format!(" + CASE WHEN instr(i.{}, ", field.column()));
                    builder.push_bind(token.clone());
                    builder.push(format!(") > 0 THEN {weight} ELSE 0 END"));
                }
                builder.push(format!(") AS t{index}"));
            }

            builder.push(" FROM items i");
            push_filters(&mut builder, query);
            builder.push(")");

            if plan.requires_all() {
                let all_hit: Vec<String> = token_columns.iter().map(|t| format!("{t} > 0")).collect();
                builder.push(format!(" WHERE {}", all_hit.join(" AND ")));
            } else {
                builder.push(format!(" WHERE ({}) > 0", token_columns.join(" + ")));
            }

            builder.push(" ORDER BY score DESC, title ASC, id ASC");
        }

        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(hit_from_row).collect()
    }

    /// Distinct item types that have at least one published item.
    pub async fn item_types(&self) -> DbResult<Vec<String>> {
        let types = sqlx::query_scalar(
            r#"
            SELECT DISTINCT item_type FROM items
            WHERE published = 1 AND in_trash = 0 AND item_type != ''
            ORDER BY item_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::testing;
    use bibmirror_core::search::{FieldWeights, SearchField, TokenMode};
    use bibmirror_core::stopwords::{BuiltinStopwords, NoStopwords};
    use bibmirror_core::ItemDraft;

    async fn seed(db: &Database, library_id: &str, key: &str, title: &str, tags: &[&str]) -> String {
        let mut draft: ItemDraft = testing::draft(library_id, key, title);
        draft.tags = tags.iter().map(|t| t.to_string()).collect();
        db.items().upsert(&draft).await.unwrap().id
    }

    fn query(library_id: &str, keywords: &str) -> SearchQuery {
        let mut query = SearchQuery::new(vec![library_id.to_string()], keywords);
        query.weights = FieldWeights::new([(SearchField::Title, 100), (SearchField::Tags, 10)]);
        query
    }

    #[tokio::test]
    async fn test_weighted_field_scores() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        seed(&db, &library.id, "TAGONLY", "Unrelated", &["x"]).await;
        seed(&db, &library.id, "BOTH", "X marks the spot", &["x"]).await;
        seed(&db, &library.id, "NONE", "Nothing", &["y"]).await;

        let hits = db.search().search(&query(&library.id, "x"), &NoStopwords).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].remote_key, "BOTH");
        assert_eq!(hits[0].score, 110);
        assert_eq!(hits[1].remote_key, "TAGONLY");
        assert_eq!(hits[1].score, 10);
    }

    #[tokio::test]
    async fn test_and_mode_requires_every_token() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        seed(&db, &library.id, "ONLYA", "alpha only", &[]).await;
        seed(&db, &library.id, "BOTH", "alpha and beta", &[]).await;

        let mut q = query(&library.id, "alpha beta");
        q.token_mode = TokenMode::And;
        let hits = db.search().search(&q, &NoStopwords).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].remote_key, "BOTH");
        assert_eq!(hits[0].score, 200);

        q.token_mode = TokenMode::Or;
        let hits = db.search().search(&q, &NoStopwords).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].remote_key, "BOTH");
        assert_eq!(hits[1].score, 100);
    }

    #[tokio::test]
    async fn test_phrase_mode_matches_substring() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        seed(&db, &library.id, "EXACT", "Deep Learning Systems", &[]).await;
        seed(&db, &library.id, "SPLIT", "Learning Deep", &[]).await;

        let mut q = query(&library.id, "deep learning");
        q.token_mode = TokenMode::Phrase;
        let hits = db.search().search(&q, &NoStopwords).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].remote_key, "EXACT");
    }

    #[tokio::test]
    async fn test_empty_keywords_order_by_title() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        seed(&db, &library.id, "B", "Beta", &[]).await;
        seed(&db, &library.id, "A", "Alpha", &[]).await;

        let hits = db.search().search(&query(&library.id, "  "), &NoStopwords).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert!(hits.iter().all(|h| h.score == 0));
    }

    #[tokio::test]
    async fn test_empty_type_filter_matches_nothing() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        seed(&db, &library.id, "A", "Alpha", &[]).await;

        let mut q = query(&library.id, "");
        q.item_types = Some(Vec::new());
        assert!(db.search().search(&q, &NoStopwords).await.unwrap().is_empty());
        q.keywords = "alpha".into();
        assert!(db.search().search(&q, &NoStopwords).await.unwrap().is_empty());

        q.item_types = Some(vec!["journalArticle".into()]);
        assert_eq!(db.search().search(&q, &NoStopwords).await.unwrap().len(), 1);
        q.item_types = Some(vec!["book".into()]);
        assert!(db.search().search(&q, &NoStopwords).await.unwrap().is_empty());
        q.item_types = None;
        assert_eq!(db.search().search(&q, &NoStopwords).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_filters_precede_scoring() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let other = testing::library(&db, "2").await;

        let hidden = seed(&db, &library.id, "HIDDEN", "Graph theory", &[]).await;
        db.items().set_published(&hidden, false).await.unwrap();

        let mut trashed = testing::draft(&library.id, "TRASH", "Graph trash");
        trashed.in_trash = true;
        db.items().upsert(&trashed).await.unwrap();

        let mut undated = testing::draft(&library.id, "UNDATED", "Graph undated");
        undated.year = String::new();
        db.items().upsert(&undated).await.unwrap();

        let mut old = testing::draft(&library.id, "OLD", "Graph old");
        old.year = "1995".into();
        old.citation_html = "<div>Old, 1995</div>".into();
        db.items().upsert(&old).await.unwrap();

        seed(&db, &other.id, "ELSEWHERE", "Graph elsewhere", &[]).await;

        let mut q = query(&library.id, "graph");
        let keys = |hits: Vec<SearchHit>| -> Vec<String> {
            let mut keys: Vec<String> = hits.into_iter().map(|h| h.remote_key).collect();
            keys.sort();
            keys
        };

        assert_eq!(
            keys(db.search().search(&q, &NoStopwords).await.unwrap()),
            vec!["OLD", "UNDATED"]
        );

        q.year_from = Some(1990);
        q.year_to = Some(2000);
        assert_eq!(keys(db.search().search(&q, &NoStopwords).await.unwrap()), vec!["OLD"]);

        q.year_from = None;
        q.year_to = None;
        q.require_citation = true;
        assert_eq!(keys(db.search().search(&q, &NoStopwords).await.unwrap()), vec!["OLD"]);

        q.library_ids.clear();
        assert!(db.search().search(&q, &NoStopwords).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_author_filter_and_stopwords() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        let linked = seed(&db, &library.id, "LINKED", "The Analytical Engine", &[]).await;
        seed(&db, &library.id, "OTHER", "The Difference Engine", &[]).await;

        let author = db.creators().create_author("Ada Lovelace").await.unwrap();
        let mapping = db.creators().ensure_mapping("Ada", "Lovelace").await.unwrap();
        db.creators().assign(&mapping.id, Some(author.id.as_str())).await.unwrap();
        db.links().link_item_creator(&linked, &mapping.id, 0).await.unwrap();

        // "the" is dropped, so AND mode only needs "engine".
        let q = query(&library.id, "the engine");
        assert_eq!(db.search().search(&q, &BuiltinStopwords).await.unwrap().len(), 2);

        let mut q = query(&library.id, "engine");
        q.author_id = Some(author.id.clone());
        let hits = db.search().search(&q, &BuiltinStopwords).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, linked);
    }

    #[tokio::test]
    async fn test_pagination_and_item_types() {
        let db = testing::database().await;
        let library = testing::library(&db, "1").await;
        for key in ["A", "B", "C"] {
            seed(&db, &library.id, key, &format!("Topic {key}"), &[]).await;
        }
        let mut book = testing::draft(&library.id, "BOOK", "Topic Book");
        book.item_type = "book".into();
        db.items().upsert(&book).await.unwrap();

        let mut q = query(&library.id, "topic");
        q.max_results = 2;
        q.offset = 2;
        let hits = db.search().search(&q, &NoStopwords).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Topic Book", "Topic C"]);

        assert_eq!(
            db.search().item_types().await.unwrap(),
            vec!["book".to_string(), "journalArticle".to_string()]
        );
    }
}
