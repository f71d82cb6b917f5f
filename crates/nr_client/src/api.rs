use std::fmt;

use async_trait::async_trait;
use nr_core::logging::ResponseSummary;
use nr_core::{
    Article, Comment, Credentials, Error, Logger, NewComment, NewsApi, RawResponse, Registration,
    Result,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

/// `NewsApi` over HTTP against the mock news server.
pub struct HttpNewsApi {
    client: Client,
    base_url: Url,
    logger: Logger,
}

impl fmt::Debug for HttpNewsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpNewsApi")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl HttpNewsApi {
    pub fn new(base_url: Url, logger: Logger) -> Self {
        Self {
            client: Client::new(),
            base_url,
            logger: logger.with_prefix("[Api]"),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| Error::Validation(format!("Base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn execute(&self, endpoint: &str, request: Value, builder: RequestBuilder) -> Result<Response> {
        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let summary = ResponseSummary {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    has_data: response.content_length().map(|len| len > 0).unwrap_or(true),
                };
                self.logger.log_api_request(endpoint, request, Some(&summary), None);
                Ok(response)
            }
            Err(e) => {
                self.logger.log_api_request(endpoint, request, None, Some(&e));
                Err(e.into())
            }
        }
    }

    /// Decodes a list record by record, logging and dropping the ones that do not fit.
    fn decode_each<T: DeserializeOwned>(&self, items: Vec<Value>, what: &str) -> Vec<T> {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    self.logger.warn(
                        &format!("Skipping malformed {}", what),
                        json!({ "index": index, "error": e.to_string() }),
                    );
                    None
                }
            })
            .collect()
    }

    async fn raw(&self, endpoint: &str, request: Value, builder: RequestBuilder) -> Result<RawResponse> {
        let response = self.execute(endpoint, request, builder).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse::new(status, body))
    }
}

#[async_trait]
impl NewsApi for HttpNewsApi {
    async fn list_news(&self) -> Result<Value> {
        let url = self.endpoint("api/news")?;
        let response = self
            .execute("/api/news", Value::Null, self.client.get(url))
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_news(&self, id_or_slug: &str) -> Result<Option<Article>> {
        let url = self.endpoint_with_segment("api/news", id_or_slug)?;
        let endpoint = format!("/api/news/{}", id_or_slug);
        let response = self
            .execute(&endpoint, Value::Null, self.client.get(url))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json::<Article>().await?))
    }

    async fn list_comments(&self, news_id: i64) -> Result<Vec<Comment>> {
        let url = self.endpoint_with_segment("api/comments", &news_id.to_string())?;
        let endpoint = format!("/api/comments/{}", news_id);
        let request = self.client.get(url).query(&[("newsId", news_id)]);
        let response = self
            .execute(&endpoint, json!({ "newsId": news_id }), request)
            .await?
            .error_for_status()?;
        let items = response.json::<Vec<Value>>().await?;
        Ok(self.decode_each(items, "comment"))
    }

    async fn add_comment(&self, news_id: i64, comment: &NewComment) -> Result<Comment> {
        let url = self.endpoint("api/comments/add")?;
        let body = json!({
            "newsId": news_id,
            "content": comment.content,
            "author": comment.author,
            "avatarUrl": comment.avatar_url,
        });
        let response = self
            .execute("/api/comments/add", body.clone(), self.client.post(url).json(&body))
            .await?
            .error_for_status()?;

        let value = response.json::<Value>().await?;
        if value.get("error").and_then(Value::as_bool).unwrap_or(false) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Помилка при додаванні коментаря");
            return Err(Error::Validation(message.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn login(&self, credentials: &Credentials) -> Result<RawResponse> {
        let url = self.endpoint("api/auth/login")?;
        let request = json!({ "email": credentials.email });
        self.raw("/api/auth/login", request, self.client.post(url).json(credentials))
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<RawResponse> {
        let url = self.endpoint("api/auth/register")?;
        let request = json!({ "email": registration.email, "username": registration.username });
        self.raw("/api/auth/register", request, self.client.post(url).json(registration))
            .await
    }

    async fn check_token(&self, token: &str) -> Result<RawResponse> {
        let url = self.endpoint("api/auth/check")?;
        self.raw("/api/auth/check", Value::Null, self.client.get(url).bearer_auth(token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpNewsApi {
        HttpNewsApi::new(Url::parse(base).unwrap(), Logger::default())
    }

    #[test]
    fn test_endpoint_joins_under_base() {
        let api = api("http://localhost:3000/app/");
        assert_eq!(
            api.endpoint("api/news").unwrap().as_str(),
            "http://localhost:3000/app/api/news"
        );
    }

    #[test]
    fn test_segment_is_escaped() {
        let api = api("http://localhost:3000/");
        assert_eq!(
            api.endpoint_with_segment("api/news", "a b/c").unwrap().as_str(),
            "http://localhost:3000/api/news/a%20b%2Fc"
        );
        assert_eq!(
            api.endpoint_with_segment("api/comments", "7").unwrap().as_str(),
            "http://localhost:3000/api/comments/7"
        );
    }

    #[test]
    fn test_malformed_comments_are_skipped() {
        let api = api("http://localhost:3000/");
        let items = vec![
            json!({ "id": 1, "newsId": 7, "content": "Перший", "likes": null }),
            json!({ "id": null, "newsId": 7, "content": "Без id" }),
            json!({ "id": 3, "newsId": 7, "author": null, "content": "Третій" }),
        ];
        let comments: Vec<Comment> = api.decode_each(items, "comment");
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(comments[0].likes, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_http_error() {
        let api = api("http://127.0.0.1:9/");
        let err = api.list_news().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
