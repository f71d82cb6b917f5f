use async_trait::async_trait;
use serde_json::Value;

use crate::types::{Article, Comment, Credentials, NewComment, Registration};
use crate::Result;

/// Status and undecoded body of a response whose error statuses carry meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The body as JSON, or `None` when it is empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

#[async_trait]
pub trait NewsApi: Send + Sync {
    /// `GET /api/news`. The payload is returned undecoded so callers can tell a
    /// malformed body from an empty list.
    async fn list_news(&self) -> Result<Value>;

    /// `GET /api/news/{idOrSlug}`; `None` when the article does not exist.
    async fn get_news(&self, id_or_slug: &str) -> Result<Option<Article>>;

    /// `GET /api/comments/{newsId}?newsId=`
    async fn list_comments(&self, news_id: i64) -> Result<Vec<Comment>>;

    /// `POST /api/comments/add`
    async fn add_comment(&self, news_id: i64, comment: &NewComment) -> Result<Comment>;

    async fn login(&self, credentials: &Credentials) -> Result<RawResponse>;

    async fn register(&self, registration: &Registration) -> Result<RawResponse>;

    async fn check_token(&self, token: &str) -> Result<RawResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_json() {
        assert!(RawResponse::new(200, "").json().is_none());
        assert!(RawResponse::new(200, "<html>").json().is_none());
        let body = RawResponse::new(401, r#"{"error":"nope"}"#).json().unwrap();
        assert_eq!(body["error"], "nope");
    }
}
