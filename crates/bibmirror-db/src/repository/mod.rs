//! # Repository Module
//!
//! Store access for the mirror, one repository per table group.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  SyncOrchestrator                                                      │
//! │       │  db.items().upsert(&draft)                                     │
//! │       ▼                                                                 │
//! │  ItemRepository                                                        │
//! │  └── INSERT ... ON CONFLICT(library_id, remote_key) DO UPDATE          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every write keyed by (library_id, remote_key) is a single atomic      │
//! │  statement, so concurrent runs cannot create duplicate rows.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`LibraryRepository`](library::LibraryRepository) - Registration and sync state
//! - [`CollectionRepository`](collection::CollectionRepository) - Collection upserts, parents
//! - [`ItemRepository`](item::ItemRepository) - Item upserts with folded search columns
//! - [`LinkRepository`](link::LinkRepository) - Collection-item and item-creator links
//! - [`CreatorRepository`](creator::CreatorRepository) - Creator map and local authors
//! - [`AttachmentRepository`](attachment::AttachmentRepository) - Attachment metadata
//! - [`SearchRepository`](search::SearchRepository) - Weighted multi-token search

pub mod attachment;
pub mod collection;
pub mod creator;
pub mod item;
pub mod library;
pub mod link;
pub mod search;

use uuid::Uuid;

/// Generates a new local row id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use bibmirror_core::{ItemDraft, Library, LibraryType, NewLibrary, RemoteCreator};
    use serde_json::json;

    use crate::pool::{Database, DbConfig};

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn library(db: &Database, remote_id: &str) -> Library {
        db.libraries()
            .register(&NewLibrary {
                title: format!("Library {remote_id}"),
                library_type: LibraryType::Group,
                remote_id: remote_id.to_string(),
                api_key: "key".to_string(),
                citation_style: "apa".to_string(),
                citation_locale: "en-US".to_string(),
                sync_interval_minutes: 60,
            })
            .await
            .unwrap()
    }

    pub fn draft(library_id: &str, key: &str, title: &str) -> ItemDraft {
        ItemDraft {
            library_id: library_id.to_string(),
            remote_key: key.to_string(),
            title: title.to_string(),
            item_type: "journalArticle".to_string(),
            year: "2020".to_string(),
            date: "2020-01-01".to_string(),
            publication_title: String::new(),
            citation_html: String::new(),
            bibtex: String::new(),
            raw_data: json!({"title": title}),
            tags: Vec::new(),
            creators: Vec::new(),
            abstract_note: String::new(),
            remote_version: 1,
            in_trash: false,
        }
    }

    pub fn creator(first: &str, last: &str) -> RemoteCreator {
        RemoteCreator {
            first_name: first.to_string(),
            last_name: last.to_string(),
            creator_type: "author".to_string(),
        }
    }
}
