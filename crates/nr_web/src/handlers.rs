use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use nr_core::date::{format_date, formatted_or_missing, now_iso};
use nr_core::{Article, Comment, Credentials};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::{AppState, UserRecord};

pub const INVALID_CREDENTIALS: &str = "Невірний логін або пароль";
pub const ARTICLE_NOT_FOUND: &str = "Статтю не знайдено";
pub const MISSING_COMMENT_FIELDS: &str = "Необхідно вказати ID новини та текст коментаря";
pub const ADD_COMMENT_FAILED: &str = "Помилка при додаванні коментаря";
pub const DEFAULT_AUTHOR: &str = "Користувач";

type SharedState = State<Arc<AppState>>;

fn with_formatted_date(mut article: Article) -> Article {
    let published = Some(article.published_at.as_str()).filter(|p| !p.is_empty());
    article.formatted_date = Some(formatted_or_missing(published));
    article
}

pub async fn login(
    State(state): SharedState,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(credentials) = body.context("Unreadable login body")?;

    let users = state.users.read().await;
    let user = users
        .iter()
        .find(|u| u.email == credentials.email && u.password == credentials.password)
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let token = format!("mock_token_{}_{}", user.id, Utc::now().timestamp_millis());
    tracing::info!("User {} logged in", user.id);
    Ok(Json(json!({ "token": token, "user": user.public() })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): SharedState,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.context("Unreadable registration body")?;
    let present = |field: Option<String>| field.filter(|f| !f.trim().is_empty());
    let (Some(username), Some(email), Some(password)) =
        (present(body.username), present(body.email), present(body.password))
    else {
        return Err(ApiError::BadRequest(
            "Необхідно вказати ім'я користувача, email та пароль".to_string(),
        ));
    };

    let mut users = state.users.write().await;
    if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
        return Err(ApiError::Conflict(
            "Користувач з таким email вже існує".to_string(),
        ));
    }

    let record = UserRecord {
        id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
        username,
        email,
        password,
        avatar: Some(random_avatar()),
    };
    let user = record.public();
    users.push(record);
    tracing::info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

/// `mock_token_<userId>_<millis>`
fn token_user_id(token: &str) -> Option<i64> {
    let rest = token.strip_prefix("mock_token_")?;
    let (id, millis) = rest.split_once('_')?;
    millis.parse::<i64>().ok()?;
    id.parse().ok()
}

pub async fn check(State(state): SharedState, headers: HeaderMap) -> impl IntoResponse {
    let user_id = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(token_user_id);

    let users = state.users.read().await;
    match user_id.and_then(|id| users.iter().find(|u| u.id == id)) {
        Some(user) => (
            StatusCode::OK,
            Json(json!({ "valid": true, "user": user.public() })),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "valid": false, "error": "Недійсний токен" })),
        ),
    }
}

pub async fn list_news(State(state): SharedState) -> Json<Vec<Article>> {
    Json(state.news.iter().cloned().map(with_formatted_date).collect())
}

/// Numeric id first, then slug.
pub async fn get_news(
    State(state): SharedState,
    Path(id_or_slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let by_id = id_or_slug
        .parse::<i64>()
        .ok()
        .and_then(|id| state.news.iter().find(|a| a.id == id));
    by_id
        .or_else(|| state.news.iter().find(|a| a.slug == id_or_slug))
        .cloned()
        .map(|a| Json(with_formatted_date(a)))
        .ok_or_else(|| ApiError::NotFound(ARTICLE_NOT_FOUND.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    #[serde(rename = "newsId")]
    pub news_id: Option<String>,
}

/// Comments filtered by the `newsId` query parameter; the path segment is
/// only part of the route.
pub async fn list_comments(
    State(state): SharedState,
    Path(_news_id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> Json<Vec<Comment>> {
    let news_id = query
        .news_id
        .and_then(|id| id.trim().parse::<i64>().ok())
        .filter(|id| *id != 0);

    let comments = state.comments.lock().await;
    Json(
        comments
            .iter()
            .filter(|c| news_id.map_or(true, |id| c.news_id == id))
            .cloned()
            .map(|mut c| {
                let created = Some(c.created_at.as_str()).filter(|s| !s.is_empty());
                c.formatted_date = Some(formatted_or_missing(created));
                c
            })
            .collect(),
    )
}

fn json_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn random_avatar() -> String {
    format!("https://i.pravatar.cc/150?img={}", rand::thread_rng().gen_range(0..70))
}

/// Validation failures answer `200 { error: true, message }`.
pub async fn add_comment(
    State(state): SharedState,
    body: Result<Json<Value>, JsonRejection>,
) -> Json<Value> {
    let failure = |message: &str| Json(json!({ "error": true, "message": message }));

    let Ok(Json(body)) = body else {
        return failure(ADD_COMMENT_FAILED);
    };
    let news_id = json_i64(body.get("newsId")).filter(|id| *id != 0);
    let content = json_str(body.get("content"));
    let (Some(news_id), Some(content)) = (news_id, content) else {
        return failure(MISSING_COMMENT_FIELDS);
    };

    let created_at = now_iso();
    let comment = Comment {
        id: Utc::now().timestamp_millis(),
        news_id,
        author: json_str(body.get("author")).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        avatar_url: json_str(body.get("avatarUrl")).unwrap_or_else(random_avatar),
        content,
        formatted_date: Some(format_date(&created_at)),
        created_at,
        likes: 0,
        is_user_comment: false,
        is_local_comment: false,
        is_realtime: false,
    };

    let mut comments = state.comments.lock().await;
    comments.push(comment.clone());
    if let Err(e) = persist_comments(&state, &comments).await {
        tracing::error!("{}: {:#}", ADD_COMMENT_FAILED, e);
        comments.pop();
        return failure(ADD_COMMENT_FAILED);
    }
    tracing::info!("Added comment {} to article {}", comment.id, comment.news_id);

    match serde_json::to_value(&comment) {
        Ok(value) => Json(value),
        Err(_) => failure(ADD_COMMENT_FAILED),
    }
}

async fn persist_comments(state: &AppState, comments: &[Comment]) -> anyhow::Result<()> {
    if let Some(dir) = state.comments_path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let data = serde_json::to_string_pretty(comments)?;
    tokio::fs::write(&state.comments_path, data)
        .await
        .with_context(|| format!("Failed to write {}", state.comments_path.display()))
}
