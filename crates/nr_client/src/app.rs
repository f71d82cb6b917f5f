use std::sync::Arc;

use nr_core::{AppConfig, ClientStorage, Logger, NewsApi, Result};
use serde_json::json;

use crate::api::HttpNewsApi;
use crate::auth::AuthStore;
use crate::catalog::CatalogStore;
use crate::comments::CommentsStore;
use crate::realtime::RealtimeSimulator;

/// All client stores, built once and shared by reference.
pub struct NewsApp {
    pub config: AppConfig,
    pub logger: Logger,
    pub auth: Arc<AuthStore>,
    pub catalog: Arc<CatalogStore>,
    pub comments: Arc<CommentsStore>,
    pub realtime: RealtimeSimulator,
}

impl NewsApp {
    /// Wires the stores and restores the persisted session and comments.
    pub fn new(config: AppConfig, api: Arc<dyn NewsApi>, storage: Arc<dyn ClientStorage>) -> Self {
        let logger = Logger::new(config.effective_log_level());

        let auth = Arc::new(AuthStore::new(api.clone(), storage.clone(), logger.clone()));
        let catalog = Arc::new(
            CatalogStore::new(api.clone(), logger.clone()).with_items_per_page(config.items_per_page),
        );
        let comments = Arc::new(CommentsStore::new(api, storage, logger.clone()));
        let realtime = RealtimeSimulator::new(comments.clone(), logger.clone());

        auth.init_auth();
        comments.load_persisted();
        logger.debug(
            "Application started",
            json!({
                "apiBaseUrl": config.api_base_url.as_str(),
                "environment": format!("{:?}", config.environment),
                "loggedIn": auth.is_logged_in(),
            }),
        );

        Self {
            config,
            logger,
            auth,
            catalog,
            comments,
            realtime,
        }
    }

    /// Talks HTTP to `config.api_base_url` and keeps client state in the
    /// `storage_kind` backend (`memory` or `file`).
    pub fn from_config(config: AppConfig, storage_kind: &str) -> Result<Self> {
        let storage = nr_storage::create_storage(storage_kind, &config.storage_path)?;
        let logger = Logger::new(config.effective_log_level());
        let api = Arc::new(HttpNewsApi::new(config.api_base_url.clone(), logger));
        Ok(Self::new(config, api, storage))
    }

    pub fn shutdown(&self) {
        self.realtime.shutdown();
    }
}
