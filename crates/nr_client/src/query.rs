//! Query state of the news catalog and the pure views derived from it.
//!
//! Nothing here caches: every view is recomputed from the articles and the
//! query it is given.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use nr_core::date::parse_timestamp;
use nr_core::Article;
use serde_json::Value;

pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;
pub const POPULAR_LIMIT: usize = 5;
pub const FEATURED_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    PublishedAt,
    Views,
    Title,
    /// Any other article field, addressed by its JSON name.
    Field(String),
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Sort key must not be empty".to_string()),
            "publishedAt" | "published_at" | "date" => Ok(SortKey::PublishedAt),
            "views" => Ok(SortKey::Views),
            "title" => Ok(SortKey::Title),
            other => Ok(SortKey::Field(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::PublishedAt => f.write_str("publishedAt"),
            SortKey::Views => f.write_str("views"),
            SortKey::Title => f.write_str("title"),
            SortKey::Field(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("Unknown sort order: {}", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// Filters, sorting and pagination selected by the reader.
///
/// An empty `selected_category`/`selected_tag` means "no filter".
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub search_query: String,
    pub selected_category: String,
    pub selected_tag: String,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            selected_category: String::new(),
            selected_tag: String::new(),
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            current_page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl QueryState {
    pub fn has_filters(&self) -> bool {
        !self.search_query.is_empty()
            || !self.selected_category.is_empty()
            || !self.selected_tag.is_empty()
    }
}

/// Search, then category, then tag.
pub fn filter_news<'a>(articles: &'a [Article], query: &QueryState) -> Vec<&'a Article> {
    let mut filtered: Vec<&Article> = articles.iter().collect();

    if !query.search_query.trim().is_empty() {
        let needle = query.search_query.to_lowercase();
        filtered.retain(|item| {
            item.title.to_lowercase().contains(&needle)
                || item.description.to_lowercase().contains(&needle)
                || item.content.to_lowercase().contains(&needle)
        });
    }

    if !query.selected_category.is_empty() {
        filtered.retain(|item| item.category == query.selected_category);
    }

    if !query.selected_tag.is_empty() {
        filtered.retain(|item| item.tags.iter().any(|tag| *tag == query.selected_tag));
    }

    filtered
}

/// Stable sort of `articles` by `key` in `order`.
pub fn sort_news<'a>(mut articles: Vec<&'a Article>, key: &SortKey, order: SortOrder) -> Vec<&'a Article> {
    match key {
        SortKey::PublishedAt => {
            sort_by_timestamp(&mut articles, |a| a.published_at.as_str(), order);
        }
        SortKey::Views => {
            articles.sort_by(|a, b| order.apply(a.views.cmp(&b.views)));
        }
        SortKey::Title => {
            let mut keyed: Vec<(String, &Article)> = articles
                .into_iter()
                .map(|a| (a.title.to_lowercase(), a))
                .collect();
            keyed.sort_by(|a, b| order.apply(a.0.cmp(&b.0)));
            articles = keyed.into_iter().map(|(_, a)| a).collect();
        }
        SortKey::Field(name) => {
            let mut keyed: Vec<(FieldKey, &Article)> = articles
                .into_iter()
                .map(|a| (FieldKey::of(a, name), a))
                .collect();
            keyed.sort_by(|a, b| order.apply(a.0.cmp(&b.0)));
            articles = keyed.into_iter().map(|(_, a)| a).collect();
        }
    }
    articles
}

/// Sorts by a timestamp. A missing timestamp counts as the epoch; items whose
/// timestamp does not parse stay in their original positions.
pub fn sort_by_timestamp<T, F>(items: &mut [T], timestamp: F, order: SortOrder)
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let mut keyed: Vec<(usize, DateTime<Utc>)> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| sort_timestamp(timestamp(item)).map(|ts| (i, ts)))
        .collect();
    let slots: Vec<usize> = keyed.iter().map(|(i, _)| *i).collect();

    keyed.sort_by(|a, b| order.apply(a.1.cmp(&b.1)));
    let sorted: Vec<T> = keyed.iter().map(|(i, _)| items[*i].clone()).collect();

    for (slot, item) in slots.into_iter().zip(sorted) {
        items[slot] = item;
    }
}

fn sort_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.trim().is_empty() {
        Some(DateTime::UNIX_EPOCH)
    } else {
        parse_timestamp(raw)
    }
}

/// Sort key for an arbitrary article field. Numbers sort before strings; missing
/// and non-scalar values count as zero.
#[derive(Debug, Clone, PartialEq)]
enum FieldKey {
    Number(f64),
    Text(String),
}

impl FieldKey {
    fn of(article: &Article, field: &str) -> Self {
        let value = serde_json::to_value(article)
            .ok()
            .and_then(|v| v.get(field).cloned())
            .unwrap_or(Value::Null);
        match value {
            Value::String(s) => FieldKey::Text(s.to_lowercase()),
            Value::Number(n) => FieldKey::Number(n.as_f64().unwrap_or(0.0)),
            Value::Bool(b) => FieldKey::Number(if b { 1.0 } else { 0.0 }),
            _ => FieldKey::Number(0.0),
        }
    }
}

impl Eq for FieldKey {}

impl PartialOrd for FieldKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldKey::Number(a), FieldKey::Number(b)) => a.total_cmp(b),
            (FieldKey::Text(a), FieldKey::Text(b)) => a.cmp(b),
            (FieldKey::Number(_), FieldKey::Text(_)) => Ordering::Less,
            (FieldKey::Text(_), FieldKey::Number(_)) => Ordering::Greater,
        }
    }
}

/// The window of `sorted` for `page`; `per_page == 0` returns everything.
pub fn paginate<'a>(sorted: &[&'a Article], page: usize, per_page: usize) -> Vec<&'a Article> {
    if per_page == 0 {
        return sorted.to_vec();
    }
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= sorted.len() {
        return Vec::new();
    }
    let end = start.saturating_add(per_page).min(sorted.len());
    sorted[start..end].to_vec()
}

/// `ceil(total / per_page)`. Without pagination everything is one page.
pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return total.min(1);
    }
    (total + per_page - 1) / per_page
}

pub fn categories(articles: &[Article]) -> Vec<String> {
    articles
        .iter()
        .filter(|a| !a.category.is_empty())
        .map(|a| a.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn tags(articles: &[Article]) -> Vec<String> {
    articles
        .iter()
        .flat_map(|a| a.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn popular_news(articles: &[Article]) -> Vec<&Article> {
    let mut sorted: Vec<&Article> = articles.iter().collect();
    sorted.sort_by(|a, b| b.views.cmp(&a.views));
    sorted.truncate(POPULAR_LIMIT);
    sorted
}

pub fn featured_news(articles: &[Article]) -> Vec<&Article> {
    articles
        .iter()
        .filter(|a| a.featured)
        .take(FEATURED_LIMIT)
        .collect()
}

/// Immutable copy of the catalog state that all views are computed from.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub articles: Vec<Article>,
    pub query: QueryState,
}

impl CatalogSnapshot {
    pub fn filtered(&self) -> Vec<&Article> {
        filter_news(&self.articles, &self.query)
    }

    pub fn sorted(&self) -> Vec<&Article> {
        sort_news(self.filtered(), &self.query.sort_by, self.query.sort_order)
    }

    pub fn page(&self) -> Vec<&Article> {
        paginate(&self.sorted(), self.query.current_page, self.query.items_per_page)
    }

    pub fn total(&self) -> usize {
        self.filtered().len()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total(), self.query.items_per_page)
    }

    pub fn categories(&self) -> Vec<String> {
        categories(&self.articles)
    }

    pub fn tags(&self) -> Vec<String> {
        tags(&self.articles)
    }

    pub fn popular(&self) -> Vec<&Article> {
        popular_news(&self.articles)
    }

    pub fn featured(&self) -> Vec<&Article> {
        featured_news(&self.articles)
    }
}
