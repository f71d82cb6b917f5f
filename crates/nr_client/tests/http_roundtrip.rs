use std::path::Path;
use std::sync::Arc;

use nr_client::auth::INVALID_CREDENTIALS;
use nr_client::{HttpNewsApi, NewsApp, SortKey, SortOrder};
use nr_core::{AppConfig, Credentials, Logger, NewComment, NewsApi, Registration};
use nr_storage::MemoryStorage;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct Harness {
    _data: TempDir,
    api: Arc<HttpNewsApi>,
    app: NewsApp,
}

async fn start() -> Harness {
    let data = TempDir::new().unwrap();
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("../nr_web/data");
    for file in ["news.json", "comments.json", "users.json"] {
        std::fs::copy(bundled.join(file), data.path().join(file)).unwrap();
    }

    let state = nr_web::AppState::load(data.path()).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(nr_web::serve(listener, state));

    let config = AppConfig::default()
        .with_api_url(&format!("http://{}", addr))
        .unwrap();
    let api = Arc::new(HttpNewsApi::new(config.api_base_url.clone(), Logger::default()));
    let app = NewsApp::new(config, api.clone(), Arc::new(MemoryStorage::new()));
    Harness { _data: data, api, app }
}

#[tokio::test]
async fn test_catalog_against_mock_server() {
    let h = start().await;
    let catalog = &h.app.catalog;

    catalog.fetch_all_news(false).await;
    assert!(catalog.error().is_none());
    assert_eq!(catalog.total(), 7);
    assert!(catalog.all_news().iter().all(|a| a.formatted_date.is_some()));

    catalog.set_category("Технології");
    assert_eq!(catalog.total(), 3);
    catalog.set_sorting(Some(SortKey::Views), Some(SortOrder::Desc));
    let views: Vec<u64> = catalog.news().iter().map(|a| a.views).collect();
    assert_eq!(views, vec![1520, 875, 640]);

    catalog.reset_filters();
    assert_eq!(catalog.total_pages(), 1);
    assert_eq!(catalog.featured_news().len(), 3);

    let article = catalog.fetch_news_item_by_id_or_slug("kyiv-tech-meetup").await.unwrap();
    assert_eq!(article.id, 3);
    assert!(catalog.fetch_news_item_by_id_or_slug("no-such-article").await.is_none());
    assert_eq!(catalog.error().as_deref(), Some("Статтю не знайдено"));
}

#[tokio::test]
async fn test_comments_against_mock_server() {
    let h = start().await;
    let comments = &h.app.comments;

    let fetched = comments.fetch_comments_by_news_id(1).await;
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].content, "Цікаво, скільки часу займе міграція великих проєктів.");
    assert!(fetched.iter().all(|c| c.formatted_date.is_some()));

    let local = comments
        .post_comment(1, NewComment { content: "Локальний".into(), ..Default::default() })
        .unwrap();
    let refetched = comments.fetch_comments_by_news_id(1).await;
    assert_eq!(refetched.len(), 3);
    assert!(refetched.iter().any(|c| c.id == local.id && c.is_local_comment));

    let created = h
        .api
        .add_comment(2, &NewComment { content: "З сервера".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(created.author, "Користувач");
    let listed = h.api.list_comments(2).await.unwrap();
    assert!(listed.iter().any(|c| c.id == created.id));
    assert!(listed.iter().all(|c| c.news_id == 2));

    let invalid = h
        .api
        .add_comment(2, &NewComment { content: String::new(), ..Default::default() })
        .await;
    assert!(invalid.is_err());
}

#[tokio::test]
async fn test_auth_against_mock_server() {
    let h = start().await;
    let auth = &h.app.auth;

    let wrong = Credentials {
        email: "admin@example.com".into(),
        password: "wrong".into(),
    };
    assert!(!auth.login(&wrong).await);
    assert_eq!(auth.error().as_deref(), Some(INVALID_CREDENTIALS));

    let right = Credentials {
        email: "admin@example.com".into(),
        password: "password".into(),
    };
    assert!(auth.login(&right).await);
    assert_eq!(auth.username(), "admin");
    assert!(auth.check_token().await);

    let registration = Registration {
        username: "newbie".into(),
        email: "newbie@example.com".into(),
        password: "secret".into(),
    };
    assert!(auth.register(&registration).await);
    assert!(!auth.register(&registration).await);
    assert!(auth.error().is_some());

    auth.logout();
    assert!(!auth.check_token().await);
}
