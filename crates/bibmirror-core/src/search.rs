//! # Search Planning
//!
//! Turns a caller's keyword string and options into a [`SearchPlan`]: the
//! tokens to match and the weight each field contributes. The plan is pure
//! data; `bibmirror-db` compiles it into SQL.
//!
//! ## Scoring Regimes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  keywords                     tokens              score                 │
//! │  ───────────────────────────  ──────────────────  ────────────────────  │
//! │  ""                           []                  none, order by title  │
//! │  "transformer"                ["transformer"]     Σ field weights hit   │
//! │  "graph neural nets" (Phrase) ["graph neural..."] Σ field weights hit   │
//! │  "graph neural nets" (And)    [graph,neural,nets] Σ, 0 unless all hit   │
//! │  "graph neural nets" (Or)     [graph,neural,nets] Σ over every hit      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Matching is a case-insensitive substring test against folded columns.

use serde::{Deserialize, Serialize};

use crate::metadata::fold;
use crate::stopwords::StopwordSource;

/// Default cap on the number of tokens a query is split into.
pub const DEFAULT_MAX_TOKENS: usize = 5;

/// Default page size for search results.
pub const DEFAULT_MAX_RESULTS: i64 = 50;

// =============================================================================
// Fields & Weights
// =============================================================================

/// A searchable item field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Creators,
    PublicationTitle,
    Tags,
    Abstract,
    Citation,
}

impl SearchField {
    /// Folded column this field is matched against.
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Title => "title_folded",
            SearchField::Creators => "creators_folded",
            SearchField::PublicationTitle => "publication_folded",
            SearchField::Tags => "tags_folded",
            SearchField::Abstract => "abstract_folded",
            SearchField::Citation => "citation_folded",
        }
    }
}

/// Weight each field contributes when it contains a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWeights(Vec<(SearchField, i64)>);

impl FieldWeights {
    /// Explicit weights. Duplicate fields keep their first weight and
    /// non-positive weights are dropped.
    pub fn new(weights: impl IntoIterator<Item = (SearchField, i64)>) -> Self {
        let mut out: Vec<(SearchField, i64)> = Vec::new();
        for (field, weight) in weights {
            if weight > 0 && !out.iter().any(|(f, _)| *f == field) {
                out.push((field, weight));
            }
        }
        Self(out)
    }

    /// Weights from a priority list: with `n` fields, the field at index `i`
    /// weighs `n - i`.
    ///
    /// ## Example
    /// ```rust
    /// use bibmirror_core::search::{FieldWeights, SearchField};
    ///
    /// let weights = FieldWeights::from_priority(&[SearchField::Title, SearchField::Tags]);
    /// assert_eq!(weights.weight(SearchField::Title), 2);
    /// assert_eq!(weights.weight(SearchField::Tags), 1);
    /// ```
    pub fn from_priority(fields: &[SearchField]) -> Self {
        let mut unique: Vec<SearchField> = Vec::new();
        for field in fields {
            if !unique.contains(field) {
                unique.push(*field);
            }
        }
        let n = unique.len() as i64;
        Self(
            unique
                .into_iter()
                .enumerate()
                .map(|(i, f)| (f, n - i as i64))
                .collect(),
        )
    }

    pub fn weight(&self, field: SearchField) -> i64 {
        self.0
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SearchField, i64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self::from_priority(&[
            SearchField::Title,
            SearchField::Creators,
            SearchField::PublicationTitle,
            SearchField::Tags,
        ])
    }
}

// =============================================================================
// Query
// =============================================================================

/// How multiple tokens combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Every token must hit at least one field.
    #[default]
    And,
    /// Any token hit counts.
    Or,
    /// The whole keyword string is one token.
    Phrase,
}

/// A search request. Only primitive filter values go in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub library_ids: Vec<String>,
    pub keywords: String,
    /// Local author id; matches items linked through the creator map.
    pub author_id: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    /// `None` means all types; `Some(empty)` matches nothing.
    pub item_types: Option<Vec<String>>,
    pub weights: FieldWeights,
    pub token_mode: TokenMode,
    pub max_tokens: usize,
    pub max_results: i64,
    pub offset: i64,
    pub locale: String,
    pub require_citation: bool,
}

impl SearchQuery {
    /// A query over `library_ids` with default options.
    pub fn new(library_ids: Vec<String>, keywords: impl Into<String>) -> Self {
        Self {
            library_ids,
            keywords: keywords.into(),
            author_id: None,
            year_from: None,
            year_to: None,
            item_types: None,
            weights: FieldWeights::default(),
            token_mode: TokenMode::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_results: DEFAULT_MAX_RESULTS,
            offset: 0,
            locale: "en".to_string(),
            require_citation: false,
        }
    }

    /// Builds the token plan for this query.
    pub fn plan(&self, stopwords: &dyn StopwordSource) -> SearchPlan {
        SearchPlan {
            tokens: plan_tokens(
                &self.keywords,
                self.token_mode,
                self.max_tokens,
                &self.locale,
                stopwords,
            ),
            mode: self.token_mode,
        }
    }
}

/// Tokens to match plus the mode combining them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub tokens: Vec<String>,
    pub mode: TokenMode,
}

impl SearchPlan {
    /// True if every token must hit (AND mode with more than one token).
    pub fn requires_all(&self) -> bool {
        self.mode == TokenMode::And && self.tokens.len() > 1
    }
}

/// Splits `keywords` into folded tokens.
///
/// Single words and phrase mode produce one token. Otherwise stopwords are
/// removed, duplicates dropped, and the list capped at `max_tokens`; a query
/// made only of stopwords falls back to the whole phrase.
pub fn plan_tokens(
    keywords: &str,
    mode: TokenMode,
    max_tokens: usize,
    locale: &str,
    stopwords: &dyn StopwordSource,
) -> Vec<String> {
    let phrase = fold(keywords);
    if phrase.is_empty() {
        return Vec::new();
    }
    if mode == TokenMode::Phrase || !phrase.contains(' ') {
        return vec![phrase];
    }

    let mut tokens: Vec<String> = Vec::new();
    for word in phrase.split(' ') {
        if word.is_empty() || stopwords.is_stopword(word, locale) {
            continue;
        }
        if !tokens.iter().any(|t| t == word) {
            tokens.push(word.to_string());
        }
        if tokens.len() >= max_tokens.max(1) {
            break;
        }
    }

    if tokens.is_empty() {
        vec![phrase]
    } else {
        tokens
    }
}

// =============================================================================
// Results
// =============================================================================

/// One scored search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub library_id: String,
    pub remote_key: String,
    pub title: String,
    pub year: String,
    pub date: String,
    pub publication_title: String,
    pub item_type: String,
    pub citation_html: String,
    pub raw_data: serde_json::Value,
    /// Zero when the query had no keywords.
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stopwords::{BuiltinStopwords, NoStopwords};

    #[test]
    fn test_priority_weights() {
        let weights = FieldWeights::from_priority(&[
            SearchField::Title,
            SearchField::Creators,
            SearchField::Tags,
            SearchField::Title,
        ]);
        assert_eq!(weights.weight(SearchField::Title), 3);
        assert_eq!(weights.weight(SearchField::Creators), 2);
        assert_eq!(weights.weight(SearchField::Tags), 1);
        assert_eq!(weights.weight(SearchField::Abstract), 0);
    }

    #[test]
    fn test_explicit_weights_drop_duplicates_and_zero() {
        let weights = FieldWeights::new([
            (SearchField::Title, 100),
            (SearchField::Tags, 10),
            (SearchField::Title, 1),
            (SearchField::Abstract, 0),
        ]);
        assert_eq!(weights.iter().count(), 2);
        assert_eq!(weights.weight(SearchField::Title), 100);
    }

    #[test]
    fn test_single_word_is_one_token() {
        let tokens = plan_tokens("Transformer", TokenMode::And, 5, "en", &BuiltinStopwords);
        assert_eq!(tokens, vec!["transformer"]);
        assert!(plan_tokens("   ", TokenMode::And, 5, "en", &BuiltinStopwords).is_empty());
    }

    #[test]
    fn test_phrase_mode_keeps_whole_string() {
        let tokens = plan_tokens("The Art of  Computer", TokenMode::Phrase, 5, "en", &BuiltinStopwords);
        assert_eq!(tokens, vec!["the art of computer"]);
    }

    #[test]
    fn test_stopwords_removed_and_capped() {
        let tokens = plan_tokens(
            "the art of computer programming art volume one",
            TokenMode::Or,
            3,
            "en",
            &BuiltinStopwords,
        );
        assert_eq!(tokens, vec!["art", "computer", "programming"]);
    }

    #[test]
    fn test_all_stopwords_fall_back_to_phrase() {
        let tokens = plan_tokens("of the", TokenMode::And, 5, "en", &BuiltinStopwords);
        assert_eq!(tokens, vec!["of the"]);
        let tokens = plan_tokens("of the", TokenMode::And, 5, "en", &NoStopwords);
        assert_eq!(tokens, vec!["of", "the"]);
    }

    #[test]
    fn test_plan_requires_all() {
        let mut query = SearchQuery::new(vec!["lib".into()], "graph networks");
        assert!(query.plan(&NoStopwords).requires_all());
        query.token_mode = TokenMode::Or;
        assert!(!query.plan(&NoStopwords).requires_all());
        query.keywords = "graph".into();
        query.token_mode = TokenMode::And;
        assert!(!query.plan(&NoStopwords).requires_all());
    }
}
