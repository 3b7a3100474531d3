//! # Raw Metadata Rules
//!
//! Everything derived from an item's raw upstream metadata: the year, the
//! display title, the creator list, tags, the trash flag, and the folded
//! text the search engine matches against.
//!
//! ## Derivation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Raw data → ItemDraft                                 │
//! │                                                                         │
//! │  data.date ─────────────► extract_year()    "circa 1999" → "1999"      │
//! │  data.title / caseName ─► item_title()                                 │
//! │  data.publicationTitle ─► publication_title()                          │
//! │  data.creators[] ───────► creators()        remote order preserved     │
//! │  data.tags[].tag ───────► tags()                                       │
//! │  data.deleted ──────────► is_trashed()                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::types::{AttachmentDraft, ItemDraft, RemoteCreator};

lazy_static! {
    /// First 19xx/20xx run anywhere in a date string.
    static ref YEAR_PATTERN: Regex = Regex::new(r"(19|20)\d{2}").unwrap();

    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Fields tried in order for an item's display title.
const TITLE_FIELDS: &[&str] = &["title", "caseName", "nameOfAct", "subject"];

/// Fields tried in order for the containing publication.
const PUBLICATION_FIELDS: &[&str] = &[
    "publicationTitle",
    "bookTitle",
    "proceedingsTitle",
    "websiteTitle",
    "blogTitle",
    "encyclopediaTitle",
    "dictionaryTitle",
];

/// Extracts the year from a free-form date string.
///
/// Returns the first run of four digits starting with 19 or 20, or an empty
/// string when there is none.
///
/// ## Example
/// ```rust
/// use bibmirror_core::metadata::extract_year;
///
/// assert_eq!(extract_year("2020-05-01"), "2020");
/// assert_eq!(extract_year("circa 1999, reprint"), "1999");
/// assert_eq!(extract_year("n.d."), "");
/// ```
pub fn extract_year(date: &str) -> String {
    YEAR_PATTERN
        .find(date)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn str_field<'a>(data: &'a Value, field: &str) -> &'a str {
    data.get(field).and_then(Value::as_str).unwrap_or("")
}

fn first_non_empty(data: &Value, fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| str_field(data, f).trim())
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Display title, falling back through type-specific title fields.
pub fn item_title(data: &Value) -> String {
    first_non_empty(data, TITLE_FIELDS)
}

/// Title of the containing publication (journal, book, proceedings, ...).
pub fn publication_title(data: &Value) -> String {
    first_non_empty(data, PUBLICATION_FIELDS)
}

/// Creator list in remote order.
///
/// Single-field creators (`{"name": "CERN"}`) map to an empty first name.
pub fn creators(data: &Value) -> Vec<RemoteCreator> {
    let Some(list) = data.get("creators").and_then(Value::as_array) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|creator| {
            let creator_type = str_field(creator, "creatorType").to_string();
            let name = str_field(creator, "name").trim();
            let (first_name, last_name) = if name.is_empty() {
                (
                    str_field(creator, "firstName").trim().to_string(),
                    str_field(creator, "lastName").trim().to_string(),
                )
            } else {
                (String::new(), name.to_string())
            };

            if first_name.is_empty() && last_name.is_empty() {
                return None;
            }

            Some(RemoteCreator {
                first_name,
                last_name,
                creator_type,
            })
        })
        .collect()
}

/// Tag names, in remote order, without empties.
pub fn tags(data: &Value) -> Vec<String> {
    data.get("tags")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|t| str_field(t, "tag").trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// True if the item sits in the remote trash (`deleted: 1` or `true`).
pub fn is_trashed(data: &Value) -> bool {
    match data.get("deleted") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

/// Lowercased, whitespace-collapsed copy of `text` for substring matching.
pub fn fold(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").to_lowercase()
}

/// Removes markup from rendered citation HTML.
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    WHITESPACE.replace_all(text.trim(), " ").to_string()
}

/// Builds the draft for one remote item.
///
/// `data` is the item's `data` object; `citation_html` and `bibtex` come from
/// the per-item sub-fetches.
pub fn draft_item(
    library_id: &str,
    remote_key: &str,
    remote_version: i64,
    data: Value,
    citation_html: String,
    bibtex: String,
) -> ItemDraft {
    let date = str_field(&data, "date").trim().to_string();

    ItemDraft {
        library_id: library_id.to_string(),
        remote_key: remote_key.to_string(),
        title: item_title(&data),
        item_type: str_field(&data, "itemType").to_string(),
        year: extract_year(&date),
        date,
        publication_title: publication_title(&data),
        citation_html: citation_html.trim().to_string(),
        bibtex: bibtex.trim().to_string(),
        tags: tags(&data),
        creators: creators(&data),
        abstract_note: str_field(&data, "abstractNote").trim().to_string(),
        remote_version,
        in_trash: is_trashed(&data),
        raw_data: data,
    }
}

/// Builds attachment metadata from a child item, or `None` for notes and
/// other non-attachment children.
pub fn draft_attachment(remote_key: &str, remote_version: i64, data: &Value) -> Option<AttachmentDraft> {
    if str_field(data, "itemType") != "attachment" {
        return None;
    }

    Some(AttachmentDraft {
        remote_key: remote_key.to_string(),
        title: str_field(data, "title").trim().to_string(),
        filename: str_field(data, "filename").trim().to_string(),
        content_type: str_field(data, "contentType").trim().to_string(),
        link_mode: str_field(data, "linkMode").trim().to_string(),
        url: str_field(data, "url").trim().to_string(),
        remote_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2020-05-01"), "2020");
        assert_eq!(extract_year("circa 1999, reprint"), "1999");
        assert_eq!(extract_year("n.d."), "");
        assert_eq!(extract_year("Spring 1875"), "");
        assert_eq!(extract_year("May 3, 2004 (2nd ed. 2011)"), "2004");
    }

    #[test]
    fn test_title_fallbacks() {
        assert_eq!(item_title(&json!({"title": "On Computable Numbers"})), "On Computable Numbers");
        assert_eq!(item_title(&json!({"title": "", "caseName": "Roe v. Wade"})), "Roe v. Wade");
        assert_eq!(item_title(&json!({})), "");
        assert_eq!(
            publication_title(&json!({"bookTitle": "Collected Papers"})),
            "Collected Papers"
        );
    }

    #[test]
    fn test_creators_keep_remote_order() {
        let data = json!({
            "creators": [
                {"creatorType": "author", "firstName": "Grace", "lastName": "Hopper"},
                {"creatorType": "editor", "name": "IEEE"},
                {"creatorType": "author", "firstName": " ", "lastName": ""}
            ]
        });
        let list = creators(&data);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].last_name, "Hopper");
        assert_eq!(list[1].first_name, "");
        assert_eq!(list[1].last_name, "IEEE");
        assert_eq!(list[1].creator_type, "editor");
    }

    #[test]
    fn test_tags_and_trash() {
        let data = json!({"tags": [{"tag": "ml"}, {"tag": ""}, {"tag": "nlp", "type": 1}], "deleted": 1});
        assert_eq!(tags(&data), vec!["ml", "nlp"]);
        assert!(is_trashed(&data));
        assert!(!is_trashed(&json!({"deleted": false})));
        assert!(!is_trashed(&json!({})));
    }

    #[test]
    fn test_fold_and_strip_html() {
        assert_eq!(fold("  Über   Grenzen "), "über grenzen");
        assert_eq!(
            strip_html("<div class=\"csl-entry\">Hopper, G. (1952). <i>Compilers</i> &amp; more</div>"),
            "Hopper, G. (1952). Compilers & more"
        );
    }

    #[test]
    fn test_draft_item() {
        let data = json!({
            "itemType": "journalArticle",
            "title": "Attention Is All You Need",
            "date": "2017-06-12",
            "publicationTitle": "NeurIPS",
            "abstractNote": "Transformers.",
            "creators": [{"creatorType": "author", "firstName": "Ashish", "lastName": "Vaswani"}],
            "tags": [{"tag": "transformers"}]
        });
        let draft = draft_item("lib", "ABCD1234", 7, data, " <div>x</div> ".into(), "@article{x}".into());
        assert_eq!(draft.year, "2017");
        assert_eq!(draft.item_type, "journalArticle");
        assert_eq!(draft.publication_title, "NeurIPS");
        assert_eq!(draft.citation_html, "<div>x</div>");
        assert_eq!(draft.creators.len(), 1);
        assert_eq!(draft.tags, vec!["transformers"]);
        assert!(!draft.in_trash);
    }

    #[test]
    fn test_draft_attachment_ignores_notes() {
        let note = json!({"itemType": "note", "note": "<p>hi</p>"});
        assert!(draft_attachment("N1", 1, &note).is_none());

        let pdf = json!({
            "itemType": "attachment",
            "title": "Full Text PDF",
            "filename": "paper.pdf",
            "contentType": "application/pdf",
            "linkMode": "imported_file"
        });
        let draft = draft_attachment("A1", 3, &pdf).unwrap();
        assert_eq!(draft.filename, "paper.pdf");
        assert_eq!(draft.remote_version, 3);
    }
}
