//! Ranked keyword search over stored items.
//!
//! The algorithm runs entirely through the [`Store`] trait: it reads the
//! candidate set, filters and scores in memory, and never writes.
//!
//! # Scoring
//!
//! 1. Tokenize the query on whitespace, lower-cased. No tokens, no results.
//! 2. An item matches when its lower-cased text contains **every** token
//!    as a substring.
//! 3. Post-filters: `date_from`, `date_to`, `media_only`, `min_likes`.
//! 4. `score = 10 × occurrences + 2·log10(likes + 1) + log10(views + 1)`,
//!    where occurrences are counted per token by a scan that resumes after
//!    each match.
//! 5. Stable sort by score (or timestamp), so ties keep discovery order.
//! 6. Truncate to `limit`, then highlight matches with `<mark>` tags.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::models::{Item, ProfileStats, SourceSummary};
use crate::store::Store;

/// Result cap applied when a query does not set one.
pub const DEFAULT_LIMIT: usize = 50;

const KEYWORD_WEIGHT: f64 = 10.0;
const LIKES_WEIGHT: f64 = 2.0;
const VIEWS_WEIGHT: f64 = 1.0;

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Relevance,
    Newest,
    Oldest,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SortMode::Relevance => "relevance",
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
        })
    }
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relevance" => Ok(SortMode::Relevance),
            "newest" => Ok(SortMode::Newest),
            "oldest" => Ok(SortMode::Oldest),
            other => bail!(
                "Unknown sort mode: {}. Use relevance, newest, or oldest.",
                other
            ),
        }
    }
}

/// A keyword query with optional filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Free text; whitespace-separated tokens are AND-ed.
    #[serde(rename = "query")]
    pub text: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    /// Inclusive lower bound on `timestamp` (epoch ms).
    #[serde(default)]
    pub date_from: Option<i64>,
    /// Inclusive upper bound on `timestamp` (epoch ms).
    #[serde(default)]
    pub date_to: Option<i64>,
    #[serde(default)]
    pub media_only: bool,
    #[serde(default)]
    pub min_likes: Option<u64>,
    #[serde(default)]
    pub sort_by: SortMode,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    fn admits(&self, item: &Item) -> bool {
        if let Some(from) = self.date_from {
            if item.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if item.timestamp > to {
                return false;
            }
        }
        if self.media_only && !item.has_media {
            return false;
        }
        if let Some(min) = self.min_likes {
            if item.likes < min {
                return false;
            }
        }
        true
    }
}

/// A matched item with its highlighted text and score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub item: Item,
    pub highlighted_text: String,
    pub score: f64,
}

/// Run a keyword search against a [`Store`] backend.
pub async fn search<S: Store + ?Sized>(store: &S, query: &SearchQuery) -> Result<Vec<SearchResult>> {
    let tokens = tokenize(&query.text);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = store.items(query.source_handle.as_deref()).await?;

    let mut scored: Vec<(Item, f64)> = candidates
        .into_iter()
        .filter_map(|item| {
            let lower = item.text.to_lowercase();
            if !tokens.iter().all(|t| lower.contains(t.as_str())) {
                return None;
            }
            if !query.admits(&item) {
                return None;
            }
            let score = score_item(&lower, &tokens, &item);
            Some((item, score))
        })
        .collect();

    // `sort_by` is stable: equal keys stay in discovery order.
    match query.sort_by {
        SortMode::Newest => scored.sort_by(|a, b| b.0.timestamp.cmp(&a.0.timestamp)),
        SortMode::Oldest => scored.sort_by(|a, b| a.0.timestamp.cmp(&b.0.timestamp)),
        SortMode::Relevance => {
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        }
    }

    scored.truncate(query.limit.unwrap_or(DEFAULT_LIMIT));

    let highlighter = Highlighter::new(&tokens);
    Ok(scored
        .into_iter()
        .map(|(item, score)| SearchResult {
            highlighted_text: highlighter.apply(&item.text),
            item,
            score,
        })
        .collect())
}

/// Split on whitespace and lower-case, dropping empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Count non-overlapping occurrences of `token` in `haystack`.
///
/// The scan resumes right after each match, so `"aa"` occurs twice in
/// `"aaaa"` and once in `"aaa"`.
pub fn count_occurrences(haystack: &str, token: &str) -> usize {
    if token.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut idx = 0;
    while let Some(pos) = haystack[idx..].find(token) {
        count += 1;
        idx += pos + token.len();
    }
    count
}

/// Score a matched item. `text_lower` is the item text already lower-cased.
pub fn score_item(text_lower: &str, tokens: &[String], item: &Item) -> f64 {
    let hits: usize = tokens
        .iter()
        .map(|t| count_occurrences(text_lower, t))
        .sum();

    KEYWORD_WEIGHT * hits as f64
        + LIKES_WEIGHT * ((item.likes as f64) + 1.0).log10()
        + VIEWS_WEIGHT * ((item.views as f64) + 1.0).log10()
}

/// Wraps case-insensitive token matches in `<mark>` tags.
struct Highlighter {
    pattern: Option<Regex>,
}

impl Highlighter {
    fn new(tokens: &[String]) -> Self {
        let alternation = tokens
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!("({})", alternation))
            .case_insensitive(true)
            .build()
            .ok();
        Self { pattern }
    }

    fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re.replace_all(text, "<mark>$1</mark>").into_owned(),
            None => text.to_string(),
        }
    }
}

/// Highlight every case-insensitive occurrence of any token in `text`.
pub fn highlight(text: &str, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return text.to_string();
    }
    Highlighter::new(tokens).apply(text)
}

/// Item count and summary for one handle.
pub async fn profile_stats<S: Store + ?Sized>(store: &S, handle: &str) -> Result<ProfileStats> {
    let count = store.indexed_count(handle).await?;
    let summary = store.get_summary(handle).await?;
    Ok(ProfileStats { count, summary })
}

/// All known sources.
pub async fn list_sources<S: Store + ?Sized>(store: &S) -> Result<Vec<SourceSummary>> {
    store.list_summaries().await
}
