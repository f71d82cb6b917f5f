use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use nr_core::{Article, Logger, NewsApi};
use serde_json::{json, Value};

use crate::flag::BusyFlag;
use crate::query::{self, CatalogSnapshot, QueryState, SortKey, SortOrder};

pub const UNEXPECTED_FORMAT: &str = "Отримано дані в неочікуваному форматі";
pub const NOT_FOUND: &str = "Статтю не знайдено";

#[derive(Debug, Default)]
struct CatalogState {
    articles: Vec<Article>,
    query: QueryState,
    error: Option<String>,
}

/// The full article list as fetched, the reader's query and the views derived
/// from both.
pub struct CatalogStore {
    api: Arc<dyn NewsApi>,
    logger: Logger,
    loading: BusyFlag,
    state: RwLock<CatalogState>,
}

impl CatalogStore {
    pub fn new(api: Arc<dyn NewsApi>, logger: Logger) -> Self {
        Self {
            api,
            logger: logger.with_prefix("[NewsStore]"),
            loading: BusyFlag::default(),
            state: RwLock::new(CatalogState::default()),
        }
    }

    pub fn with_items_per_page(self, items_per_page: usize) -> Self {
        self.write().query.items_per_page = items_per_page;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the whole catalog. Does nothing while a load is running, or when
    /// articles are cached and `force_refresh` is false.
    pub async fn fetch_all_news(&self, force_refresh: bool) {
        let Some(_loading) = self.loading.try_acquire() else {
            self.logger.debug(
                "Skipping fetch_all_news",
                json!({ "isLoading": true, "forceRefresh": force_refresh }),
            );
            return;
        };

        {
            let mut state = self.write();
            if !state.articles.is_empty() && !force_refresh {
                self.logger.debug(
                    "Skipping fetch_all_news",
                    json!({
                        "isLoading": false,
                        "currentNewsCount": state.articles.len(),
                        "forceRefresh": force_refresh,
                    }),
                );
                return;
            }
            state.error = None;
        }

        self.logger.info("Fetching all news", Value::Null);
        let started = Instant::now();
        let outcome = self.api.list_news().await;

        let mut state = self.write();
        match outcome {
            Ok(Value::Array(items)) => {
                let received = items.len();
                let articles = self.decode_articles(items);
                self.logger.info(
                    "News loaded successfully",
                    json!({ "count": articles.len(), "skipped": received - articles.len() }),
                );
                state.articles = articles;
            }
            Ok(other) => {
                self.logger.error(
                    "Invalid news data format",
                    json!({ "dataType": json_type(&other), "isArray": false }),
                );
                state.error = Some(UNEXPECTED_FORMAT.to_string());
                state.articles.clear();
            }
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "fetch_all_news" }));
                state.error = Some(e.user_message());
                state.articles.clear();
            }
        }
        drop(state);

        self.logger.log_performance("fetch_all_news", started, None);
    }

    /// Decodes each record on its own; one that does not fit is logged and left out.
    fn decode_articles(&self, items: Vec<Value>) -> Vec<Article> {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value::<Article>(item) {
                Ok(article) => Some(article),
                Err(e) => {
                    self.logger.warn(
                        "Skipping malformed article",
                        json!({ "index": index, "error": e.to_string() }),
                    );
                    None
                }
            })
            .collect()
    }

    /// Looks `key` up in the cache by id or slug, falling back to the server.
    /// A fetched article replaces the cached entry with the same id or slug.
    pub async fn fetch_news_item_by_id_or_slug(&self, key: &str) -> Option<Article> {
        if key.trim().is_empty() {
            self.logger
                .warn("fetch_news_item_by_id_or_slug called without ID or slug", Value::Null);
            return None;
        }

        {
            let mut state = self.write();
            state.error = None;
            if let Some(cached) = state
                .articles
                .iter()
                .find(|a| a.slug == key || a.id.to_string() == key)
            {
                self.logger.debug(
                    "Found news item in cache",
                    json!({ "id": cached.id, "slug": cached.slug }),
                );
                return Some(cached.clone());
            }
        }

        self.logger.debug("Fetching news item", json!({ "idOrSlug": key }));
        let outcome = self.api.get_news(key).await;

        let mut state = self.write();
        match outcome {
            Ok(Some(article)) => {
                let existing = state
                    .articles
                    .iter()
                    .position(|a| a.id == article.id || a.slug == article.slug);
                match existing {
                    Some(index) => {
                        self.logger.debug(
                            "Updating existing news item in cache",
                            json!({ "id": article.id, "slug": article.slug }),
                        );
                        state.articles[index] = article.clone();
                    }
                    None => {
                        self.logger.debug(
                            "Adding new news item to cache",
                            json!({ "id": article.id, "slug": article.slug }),
                        );
                        state.articles.push(article.clone());
                    }
                }
                Some(article)
            }
            Ok(None) => {
                self.logger.warn("News item not found", json!({ "idOrSlug": key }));
                state.error = Some(NOT_FOUND.to_string());
                None
            }
            Err(e) => {
                self.logger.log_error(&e, json!({ "idOrSlug": key }));
                state.error = Some(e.user_message());
                None
            }
        }
    }

    pub fn set_search_query(&self, search: &str) {
        let mut state = self.write();
        self.logger.debug(
            "Setting search query",
            json!({ "previousQuery": state.query.search_query, "newQuery": search }),
        );
        state.query.search_query = search.to_string();
        state.query.current_page = 1;
    }

    pub fn set_category(&self, category: &str) {
        let mut state = self.write();
        self.logger.debug(
            "Setting category",
            json!({ "previousCategory": state.query.selected_category, "newCategory": category }),
        );
        state.query.selected_category = category.to_string();
        state.query.selected_tag.clear();
        state.query.current_page = 1;
    }

    pub fn set_tag(&self, tag: &str) {
        let mut state = self.write();
        self.logger.debug(
            "Setting tag",
            json!({ "previousTag": state.query.selected_tag, "newTag": tag }),
        );
        state.query.selected_tag = tag.to_string();
        state.query.selected_category.clear();
        state.query.current_page = 1;
    }

    /// Updates whichever of key and order is given; always returns to page 1.
    pub fn set_sorting(&self, sort_by: Option<SortKey>, sort_order: Option<SortOrder>) {
        let mut state = self.write();
        self.logger.debug(
            "Setting sorting",
            json!({
                "previousBy": state.query.sort_by.to_string(),
                "newBy": sort_by.as_ref().map(ToString::to_string),
                "previousOrder": state.query.sort_order.to_string(),
                "newOrder": sort_order.map(|o| o.to_string()),
            }),
        );
        if let Some(sort_by) = sort_by {
            state.query.sort_by = sort_by;
        }
        if let Some(sort_order) = sort_order {
            state.query.sort_order = sort_order;
        }
        state.query.current_page = 1;
    }

    pub fn set_items_per_page(&self, items_per_page: usize) {
        let mut state = self.write();
        state.query.items_per_page = items_per_page;
        state.query.current_page = 1;
    }

    /// Moves to `page` if it lies within `[1, total_pages]`.
    pub fn go_to_page(&self, page: usize) -> bool {
        let mut state = self.write();
        let total = query::filter_news(&state.articles, &state.query).len();
        let total_pages = query::total_pages(total, state.query.items_per_page);

        if page >= 1 && page <= total_pages {
            self.logger.debug(
                "Changing page",
                json!({
                    "fromPage": state.query.current_page,
                    "toPage": page,
                    "totalPages": total_pages,
                }),
            );
            state.query.current_page = page;
            true
        } else {
            self.logger.warn(
                "Invalid page number",
                json!({ "requestedPage": page, "totalPages": total_pages }),
            );
            false
        }
    }

    /// Clears search, category and tag. Sorting is kept.
    pub fn reset_filters(&self) {
        let mut state = self.write();
        self.logger.debug(
            "Resetting all filters",
            json!({
                "hadFilters": state.query.has_filters(),
                "previousSearchQuery": state.query.search_query,
                "previousCategory": state.query.selected_category,
                "previousTag": state.query.selected_tag,
            }),
        );
        state.query.search_query.clear();
        state.query.selected_category.clear();
        state.query.selected_tag.clear();
        state.query.current_page = 1;
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.read();
        CatalogSnapshot {
            articles: state.articles.clone(),
            query: state.query.clone(),
        }
    }

    fn view<R>(&self, f: impl FnOnce(&[Article], &QueryState) -> R) -> R {
        let state = self.read();
        f(&state.articles, &state.query)
    }

    pub fn query(&self) -> QueryState {
        self.read().query.clone()
    }

    pub fn all_news(&self) -> Vec<Article> {
        self.read().articles.clone()
    }

    pub fn filtered_news(&self) -> Vec<Article> {
        self.view(|articles, q| owned(query::filter_news(articles, q)))
    }

    pub fn sorted_news(&self) -> Vec<Article> {
        self.view(|articles, q| {
            owned(query::sort_news(query::filter_news(articles, q), &q.sort_by, q.sort_order))
        })
    }

    /// The current page of the sorted view.
    pub fn news(&self) -> Vec<Article> {
        self.view(|articles, q| {
            let sorted = query::sort_news(query::filter_news(articles, q), &q.sort_by, q.sort_order);
            let page = query::paginate(&sorted, q.current_page, q.items_per_page);
            self.logger.debug(
                "Paginating news",
                json!({
                    "page": q.current_page,
                    "itemsPerPage": q.items_per_page,
                    "resultsCount": page.len(),
                }),
            );
            owned(page)
        })
    }

    pub fn total(&self) -> usize {
        self.view(|articles, q| query::filter_news(articles, q).len())
    }

    pub fn total_pages(&self) -> usize {
        self.view(|articles, q| {
            query::total_pages(query::filter_news(articles, q).len(), q.items_per_page)
        })
    }

    pub fn categories(&self) -> Vec<String> {
        self.view(|articles, _| query::categories(articles))
    }

    pub fn tags(&self) -> Vec<String> {
        self.view(|articles, _| query::tags(articles))
    }

    pub fn popular_news(&self) -> Vec<Article> {
        self.view(|articles, _| owned(query::popular_news(articles)))
    }

    pub fn featured_news(&self) -> Vec<Article> {
        self.view(|articles, _| owned(query::featured_news(articles)))
    }

    pub fn has_filters(&self) -> bool {
        self.read().query.has_filters()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}

fn owned(articles: Vec<&Article>) -> Vec<Article> {
    articles.into_iter().cloned().collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
