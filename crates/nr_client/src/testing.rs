//! Test doubles shared by the store tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nr_core::{
    Article, ClientStorage, Comment, Credentials, Error, NewComment, NewsApi, RawResponse,
    Registration, Result,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

pub(crate) fn article(id: i64, slug: &str, category: &str, tags: &[&str]) -> Value {
    json!({
        "id": id,
        "slug": slug,
        "title": format!("Новина {}", id),
        "description": "",
        "content": "",
        "category": category,
        "tags": tags,
        "publishedAt": format!("2024-03-{:02}T10:00:00Z", id.clamp(1, 28)),
        "views": id * 10,
        "featured": false,
    })
}

pub(crate) fn comment(id: i64, news_id: i64, created_at: &str) -> Comment {
    Comment {
        id,
        news_id,
        author: "Сервер".to_string(),
        avatar_url: String::new(),
        content: format!("Коментар {}", id),
        created_at: created_at.to_string(),
        formatted_date: None,
        likes: 0,
        is_user_comment: false,
        is_local_comment: false,
        is_realtime: false,
    }
}

pub(crate) struct MockApi {
    pub news: Mutex<Value>,
    pub items: Mutex<Vec<Article>>,
    pub comments: Mutex<Vec<Comment>>,
    pub login_response: Mutex<RawResponse>,
    pub register_response: Mutex<RawResponse>,
    pub check_response: Mutex<RawResponse>,
    /// When set, every call waits for a notification before answering.
    pub gate: Mutex<Option<Arc<Notify>>>,
    failure: Mutex<Option<(u16, String)>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self {
            news: Mutex::new(json!([])),
            items: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            login_response: Mutex::new(RawResponse::new(500, "")),
            register_response: Mutex::new(RawResponse::new(500, "")),
            check_response: Mutex::new(RawResponse::new(500, "")),
            gate: Mutex::new(None),
            failure: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_news(news: Value) -> Self {
        let api = Self::new();
        *api.news.lock().unwrap() = news;
        api
    }

    pub(crate) fn with_comments(comments: Vec<Comment>) -> Self {
        let api = Self::new();
        *api.comments.lock().unwrap() = comments;
        api
    }

    pub(crate) fn fail_with(&self, status: u16, message: &str) {
        *self.failure.lock().unwrap() = Some((status, message.to_string()));
    }

    pub(crate) fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub(crate) fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    async fn enter(&self, name: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(name).or_default() += 1;
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.failure.lock().unwrap().clone() {
            Some((status, message)) => Err(Error::Api { status, message }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NewsApi for MockApi {
    async fn list_news(&self) -> Result<Value> {
        self.enter("list_news").await?;
        Ok(self.news.lock().unwrap().clone())
    }

    async fn get_news(&self, id_or_slug: &str) -> Result<Option<Article>> {
        self.enter("get_news").await?;
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id.to_string() == id_or_slug || a.slug == id_or_slug)
            .cloned())
    }

    async fn list_comments(&self, _news_id: i64) -> Result<Vec<Comment>> {
        self.enter("list_comments").await?;
        Ok(self.comments.lock().unwrap().clone())
    }

    async fn add_comment(&self, _news_id: i64, _comment: &NewComment) -> Result<Comment> {
        self.enter("add_comment").await?;
        Err(Error::Validation("not used".to_string()))
    }

    async fn login(&self, _credentials: &Credentials) -> Result<RawResponse> {
        self.enter("login").await?;
        Ok(self.login_response.lock().unwrap().clone())
    }

    async fn register(&self, _registration: &Registration) -> Result<RawResponse> {
        self.enter("register").await?;
        Ok(self.register_response.lock().unwrap().clone())
    }

    async fn check_token(&self, _token: &str) -> Result<RawResponse> {
        self.enter("check_token").await?;
        Ok(self.check_response.lock().unwrap().clone())
    }
}

/// Storage whose every operation fails.
pub(crate) struct FailingStorage;

impl ClientStorage for FailingStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("quota exceeded".to_string()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("quota exceeded".to_string()))
    }

    fn remove_item(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("quota exceeded".to_string()))
    }
}
