use crate::Result;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const AUTH_USER_KEY: &str = "auth_user";
pub const COMMENTS_KEY: &str = "news_comments";

/// Synchronous key/value store that survives restarts of the client.
///
/// It mirrors client state and is never the source of truth; callers are expected
/// to log and ignore failures.
pub trait ClientStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;
}
