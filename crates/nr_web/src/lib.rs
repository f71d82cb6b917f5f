use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, ServerConfig, UserRecord};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/check", get(handlers::check))
        .route("/api/news", get(handlers::list_news))
        .route("/api/news/:id", get(handlers::get_news))
        .route("/api/comments/add", post(handlers::add_comment))
        .route("/api/comments/:id", get(handlers::list_comments))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serves the mock API on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Mock news API listening on http://{}", addr);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::load(&config.data_dir).await?;
    let listener = TcpListener::bind(config.addr).await?;
    serve(listener, state).await
}

pub mod prelude {
    pub use crate::{create_app, AppState, ServerConfig};
    pub use nr_core::{Article, Comment, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use nr_core::{Article, Comment};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn article(id: i64, slug: &str, published_at: &str) -> Article {
        serde_json::from_value(json!({
            "id": id,
            "slug": slug,
            "title": format!("Стаття {}", id),
            "publishedAt": published_at,
        }))
        .unwrap()
    }

    fn comment(id: i64, news_id: i64) -> Comment {
        serde_json::from_value(json!({
            "id": id,
            "newsId": news_id,
            "author": "Анна",
            "content": "Текст",
            "createdAt": "2024-03-05T10:00:00Z",
        }))
        .unwrap()
    }

    fn state(dir: &TempDir) -> AppState {
        AppState::new(
            vec![article(1, "first", "2024-03-05T10:00:00Z"), article(2, "1", "")],
            vec![comment(10, 1), comment(11, 2)],
            vec![UserRecord {
                id: 1,
                username: "admin".into(),
                email: "admin@example.com".into(),
                password: "password".into(),
                avatar: None,
            }],
            dir.path().join("comments.json"),
        )
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_news_list_and_item() {
        let dir = TempDir::new().unwrap();
        let app = create_app(state(&dir));

        let (status, body) = call(app.clone(), get("/api/news")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["formattedDate"], "05.03.2024");
        assert_eq!(body[1]["formattedDate"], "Дата відсутня");

        let (status, body) = call(app.clone(), get("/api/news/first")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);

        // Numeric ids win over slugs.
        let (_, body) = call(app.clone(), get("/api/news/1")).await;
        assert_eq!(body["id"], 1);

        let (status, body) = call(app, get("/api/news/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Статтю не знайдено");
    }

    #[tokio::test]
    async fn test_comments_filter_and_add() {
        let dir = TempDir::new().unwrap();
        let app = create_app(state(&dir));

        let (_, body) = call(app.clone(), get("/api/comments/1?newsId=1")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["formattedDate"], "05.03.2024");
        let (_, body) = call(app.clone(), get("/api/comments/1")).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = call(app.clone(), post_json("/api/comments/add", json!({ "newsId": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], handlers::MISSING_COMMENT_FIELDS);

        let (_, body) = call(
            app.clone(),
            post_json("/api/comments/add", json!({ "newsId": "1", "content": "Новий" })),
        )
        .await;
        assert_eq!(body["author"], "Користувач");
        assert_eq!(body["newsId"], 1);
        assert!(body["avatarUrl"].as_str().unwrap().starts_with("https://i.pravatar.cc/"));

        let saved: Vec<Comment> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("comments.json")).unwrap()).unwrap();
        assert_eq!(saved.len(), 3);

        let (_, body) = call(app, get("/api/comments/1?newsId=1")).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_login_register_check() {
        let dir = TempDir::new().unwrap();
        let app = create_app(state(&dir));

        let (status, body) = call(
            app.clone(),
            post_json("/api/auth/login", json!({ "email": "admin@example.com", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Невірний логін або пароль");

        let (status, body) = call(
            app.clone(),
            post_json("/api/auth/login", json!({ "email": "admin@example.com", "password": "password" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert!(token.starts_with("mock_token_1_"));
        assert_eq!(body["user"]["username"], "admin");
        assert!(body["user"].get("password").is_none());

        let check = Request::builder()
            .uri("/api/auth/check")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app.clone(), check).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);

        let (status, body) = call(app.clone(), get("/api/auth/check")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["valid"], false);

        let registration = json!({ "username": "new", "email": "new@example.com", "password": "pw" });
        let (status, body) = call(app.clone(), post_json("/api/auth/register", registration.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["id"], 2);

        let (status, _) = call(app.clone(), post_json("/api/auth/register", registration)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = call(app.clone(), post_json("/api/auth/register", json!({ "email": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let garbage = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        let (status, body) = call(app, garbage).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_load_requires_news_file() {
        let dir = TempDir::new().unwrap();
        assert!(AppState::load(dir.path()).await.is_err());

        std::fs::write(dir.path().join("news.json"), "[]").unwrap();
        let state = AppState::load(dir.path()).await.unwrap();
        assert!(state.news.is_empty());
        assert!(state.comments.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_bundled_data_loads() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let state = AppState::load(&dir).await.unwrap();
        assert!(!state.news.is_empty());
        assert!(!state.users.read().await.is_empty());
    }
}
