//! # Remote Payloads
//!
//! Wire shapes returned by the bibliography API. Only the fields the mirror
//! reads are modeled; item metadata stays an opaque JSON map.

use serde::Deserialize;
use serde_json::Value;

/// One entry of `GET /{scope}/{id}/collections`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCollection {
    pub key: String,
    #[serde(default)]
    pub version: i64,
    pub data: RemoteCollectionData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCollectionData {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "parentCollection")]
    pub parent_collection: ParentRef,
}

/// `parentCollection` is a key string, or `false` for root collections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParentRef {
    Key(String),
    None(bool),
}

impl Default for ParentRef {
    fn default() -> Self {
        ParentRef::None(false)
    }
}

impl ParentRef {
    /// The parent key, if it names one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ParentRef::Key(key) if !key.trim().is_empty() => Some(key.trim()),
            _ => None,
        }
    }
}

/// One entry of `GET /{scope}/{id}/items/top` or `/items/{key}/children`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItem {
    pub key: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub data: Value,
}

/// `GET /{scope}/{id}/items/{key}?include=data,bib`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItemDetail {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub bib: String,
    #[serde(default)]
    pub data: Value,
}

/// `GET /{scope}/{id}/deleted?since=N`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletedObjects {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
}

impl DeletedObjects {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.items.is_empty()
    }
}

/// Parses a `format=keys` body: one key per line, blanks ignored.
pub fn parse_keys(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_parent_variants() {
        let page: Vec<RemoteCollection> = serde_json::from_str(
            r#"[
                {"key": "AAA", "version": 4, "data": {"name": "Root", "parentCollection": false}},
                {"key": "BBB", "version": 5, "data": {"name": "Child", "parentCollection": "AAA"}},
                {"key": "CCC", "version": 6, "data": {"name": "Bare"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(page[0].data.parent_collection.key(), None);
        assert_eq!(page[1].data.parent_collection.key(), Some("AAA"));
        assert_eq!(page[2].data.parent_collection, ParentRef::None(false));
        assert_eq!(page[1].version, 5);
    }

    #[test]
    fn test_item_detail_defaults() {
        let detail: RemoteItemDetail =
            serde_json::from_str(r#"{"version": 9, "data": {"title": "T"}}"#).unwrap();
        assert_eq!(detail.version, 9);
        assert!(detail.bib.is_empty());
        assert_eq!(detail.data["title"], "T");
    }

    #[test]
    fn test_deleted_objects() {
        let deleted: DeletedObjects =
            serde_json::from_str(r#"{"collections": ["A"], "items": [], "searches": ["S"]}"#).unwrap();
        assert_eq!(deleted.collections, vec!["A".to_string()]);
        assert!(!deleted.is_empty());
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(parse_keys("ABCD1234\n\nEFGH5678\n"), vec!["ABCD1234", "EFGH5678"]);
        assert!(parse_keys("").is_empty());
    }
}
