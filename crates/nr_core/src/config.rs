use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::logging::LogLevel;
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/";
pub const DEFAULT_STORAGE_PATH: &str = ".news-reader/storage.json";
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Minimum log level used when none is configured explicitly.
    pub fn default_log_level(&self) -> LogLevel {
        match self {
            Environment::Development => LogLevel::Debug,
            Environment::Production => LogLevel::Warn,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" | "" => Ok(Environment::Development),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: Url,
    pub storage_path: PathBuf,
    pub environment: Environment,
    pub log_level: Option<LogLevel>,
    pub items_per_page: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            environment: Environment::default(),
            log_level: None,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl AppConfig {
    /// Reads `NEWS_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("NEWS_API_URL") {
            config = config.with_api_url(&url)?;
        }
        if let Some(path) = lookup("NEWS_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(env) = lookup("NEWS_ENV") {
            config.environment = env.parse().map_err(Error::Validation)?;
        }
        if let Some(level) = lookup("NEWS_LOG_LEVEL") {
            config.log_level = Some(level.parse().map_err(Error::Validation)?);
        }
        if let Some(per_page) = lookup("NEWS_ITEMS_PER_PAGE") {
            config.items_per_page = per_page.trim().parse().map_err(|_| {
                Error::Validation(format!("Invalid NEWS_ITEMS_PER_PAGE: {}", per_page))
            })?;
        }

        Ok(config)
    }

    /// Sets the API base URL, making sure it ends with a slash so that relative
    /// endpoint paths join under it.
    pub fn with_api_url(mut self, url: &str) -> Result<Self> {
        let mut url = url.trim().to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.api_base_url = Url::parse(&url)?;
        Ok(self)
    }

    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level
            .unwrap_or_else(|| self.environment.default_log_level())
    }
}
