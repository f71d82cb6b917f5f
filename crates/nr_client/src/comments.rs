use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use nr_core::date::{format_date, now_iso};
use nr_core::storage::COMMENTS_KEY;
use nr_core::{ClientStorage, Comment, Error, Logger, NewComment, NewsApi, Result};
use rand::Rng;
use serde_json::{json, Value};

use crate::flag::BusyFlag;
use crate::persist::Mirror;
use crate::query::{sort_by_timestamp, SortOrder};

pub const DEFAULT_AUTHOR: &str = "Користувач";
pub const MISSING_FIELDS: &str = "Необхідно вказати ID новини та текст коментаря";

pub fn random_avatar() -> String {
    let img = rand::thread_rng().gen_range(1..=70);
    format!("https://i.pravatar.cc/150?img={}", img)
}

#[derive(Debug, Default)]
struct CommentsState {
    comments: Vec<Comment>,
    current_news_id: Option<i64>,
    error: Option<String>,
}

/// Comments of every article in one collection, keyed by comment id.
///
/// Server, locally authored and realtime comments live side by side and are
/// told apart by their flags. Every mutation is mirrored to client storage.
pub struct CommentsStore {
    api: Arc<dyn NewsApi>,
    mirror: Mirror,
    logger: Logger,
    loading: BusyFlag,
    state: Mutex<CommentsState>,
}

impl CommentsStore {
    pub fn new(api: Arc<dyn NewsApi>, storage: Arc<dyn ClientStorage>, logger: Logger) -> Self {
        let logger = logger.with_prefix("[CommentsStore]");
        Self {
            api,
            mirror: Mirror::new(storage, logger.clone()),
            logger,
            loading: BusyFlag::default(),
            state: Mutex::new(CommentsState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CommentsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, comments: &[Comment]) {
        self.mirror.write_json(COMMENTS_KEY, comments);
    }

    /// Merges persisted comments whose ids are not in memory yet and returns
    /// how many were added.
    pub fn load_persisted(&self) -> usize {
        let Some(stored) = self.mirror.read_json::<Vec<Comment>>(COMMENTS_KEY) else {
            return 0;
        };

        let mut state = self.lock();
        let mut added = 0;
        for comment in stored {
            if !state.comments.iter().any(|c| c.id == comment.id) {
                state.comments.push(comment);
                added += 1;
            }
        }
        if added > 0 {
            self.logger
                .debug("Restored comments from storage", json!({ "count": added }));
        }
        added
    }

    /// Refreshes the server comments of one article and returns its comments,
    /// newest first. Local comments survive the refresh. On failure memory is
    /// left as it was.
    pub async fn fetch_comments_by_news_id(&self, news_id: i64) -> Vec<Comment> {
        let Some(_loading) = self.loading.try_acquire() else {
            self.logger
                .debug("Skipping fetch_comments_by_news_id", json!({ "newsId": news_id }));
            return self.comments_by_news_id(news_id);
        };

        self.load_persisted();
        self.lock().error = None;

        match self.api.list_comments(news_id).await {
            Ok(fetched) => {
                let mut state = self.lock();
                state
                    .comments
                    .retain(|c| c.news_id != news_id || c.is_local_comment);

                let mut added = 0;
                for comment in fetched.into_iter().filter(|c| c.news_id == news_id) {
                    if !state.comments.iter().any(|c| c.id == comment.id) {
                        state.comments.push(comment);
                        added += 1;
                    }
                }
                self.persist(&state.comments);
                self.logger.info(
                    "Comments loaded",
                    json!({ "newsId": news_id, "count": added }),
                );
            }
            Err(e) => {
                self.logger.log_error(&e, json!({ "newsId": news_id }));
                self.lock().error = Some(e.user_message());
            }
        }

        self.comments_by_news_id(news_id)
    }

    fn insert(&self, state: &mut CommentsState, comment: Comment) -> bool {
        if state.comments.iter().any(|c| c.id == comment.id) {
            return false;
        }
        self.logger.info(
            "Added comment",
            json!({ "id": comment.id, "newsId": comment.news_id }),
        );
        state.comments.push(comment);
        self.persist(&state.comments);
        true
    }

    /// Inserts `comment` unless its id is already present.
    pub fn add_comment(&self, comment: Comment) -> bool {
        let mut state = self.lock();
        self.insert(&mut state, comment)
    }

    /// Authors a comment locally and inserts it.
    pub fn post_comment(&self, news_id: i64, data: NewComment) -> Result<Comment> {
        if news_id <= 0 || data.content.trim().is_empty() {
            let err = Error::Validation(MISSING_FIELDS.to_string());
            self.logger.log_error(&err, json!({ "newsId": news_id }));
            self.lock().error = Some(err.user_message());
            return Err(err);
        }

        let created_at = now_iso();
        let author = data
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        let avatar_url = data
            .avatar_url
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(random_avatar);

        let mut state = self.lock();
        state.error = None;

        let mut id = Utc::now().timestamp_millis();
        while state.comments.iter().any(|c| c.id == id) {
            id += 1;
        }

        let comment = Comment {
            id,
            news_id,
            author,
            avatar_url,
            content: data.content,
            formatted_date: Some(format_date(&created_at)),
            created_at,
            likes: 0,
            is_user_comment: true,
            is_local_comment: true,
            is_realtime: false,
        };
        self.insert(&mut state, comment.clone());
        drop(state);

        self.logger.log_user_action(
            "post_comment",
            json!({ "newsId": news_id, "commentId": comment.id }),
        );
        Ok(comment)
    }

    /// Accepts a comment pushed by the realtime feed.
    pub fn handle_new_comment(&self, mut comment: Comment) -> bool {
        if comment.id == 0 || comment.news_id == 0 {
            self.logger.warn(
                "Received comment in unexpected format",
                serde_json::to_value(&comment).unwrap_or(Value::Null),
            );
            return false;
        }

        comment.is_realtime = true;
        if comment.formatted_date.is_none() {
            comment.formatted_date = Some(format_date(&comment.created_at));
        }
        self.add_comment(comment)
    }

    pub fn set_current_news_id(&self, news_id: i64) {
        self.lock().current_news_id = Some(news_id);
    }

    pub fn current_news_id(&self) -> Option<i64> {
        self.lock().current_news_id
    }

    /// Comments of `news_id`, newest first.
    pub fn comments_by_news_id(&self, news_id: i64) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .lock()
            .comments
            .iter()
            .filter(|c| c.news_id == news_id)
            .cloned()
            .collect();
        sort_by_timestamp(&mut comments, |c| c.created_at.as_str(), SortOrder::Desc);
        comments
    }

    pub fn current_news_comments(&self) -> Vec<Comment> {
        match self.current_news_id() {
            Some(news_id) => self.comments_by_news_id(news_id),
            None => Vec::new(),
        }
    }

    pub fn comments_count(&self, news_id: i64) -> usize {
        self.lock()
            .comments
            .iter()
            .filter(|c| c.news_id == news_id)
            .count()
    }

    pub fn all_comments(&self) -> Vec<Comment> {
        self.lock().comments.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }
}
