use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use nr_core::{Article, Comment, User};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

pub const NEWS_FILE: &str = "news.json";
pub const COMMENTS_FILE: &str = "comments.json";
pub const USERS_FILE: &str = "users.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("crates/nr_web/data"),
        }
    }
}

/// A user account as stored in `users.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserRecord {
    pub fn public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Data behind the mock API.
///
/// Articles are read-only. Comments are appended to `comments.json`; users
/// registered at runtime are kept in memory only.
pub struct AppState {
    pub news: Vec<Article>,
    pub comments: Mutex<Vec<Comment>>,
    pub comments_path: PathBuf,
    pub users: RwLock<Vec<UserRecord>>,
}

impl AppState {
    pub fn new(news: Vec<Article>, comments: Vec<Comment>, users: Vec<UserRecord>, comments_path: PathBuf) -> Self {
        Self {
            news,
            comments: Mutex::new(comments),
            comments_path,
            users: RwLock::new(users),
        }
    }

    /// Loads the JSON data files of `data_dir`. Only `news.json` is required.
    pub async fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let news = read_json::<Vec<Article>>(&data_dir.join(NEWS_FILE))
            .await?
            .with_context(|| format!("{} not found in {}", NEWS_FILE, data_dir.display()))?;
        let comments_path = data_dir.join(COMMENTS_FILE);
        let comments = read_json::<Vec<Comment>>(&comments_path).await?.unwrap_or_default();
        let users = read_json::<Vec<UserRecord>>(&data_dir.join(USERS_FILE))
            .await?
            .unwrap_or_default();

        tracing::info!(
            "Loaded {} articles, {} comments and {} users from {}",
            news.len(),
            comments.len(),
            users.len(),
            data_dir.display()
        );
        Ok(Self::new(news, comments, users, comments_path))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}
