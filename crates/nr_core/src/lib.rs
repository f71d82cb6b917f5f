pub mod api;
pub mod config;
pub mod date;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

pub use api::{NewsApi, RawResponse};
pub use config::{AppConfig, Environment};
pub use error::Error;
pub use logging::{LogEntry, LogLevel, Logger};
pub use storage::ClientStorage;
pub use types::{Article, Comment, Credentials, NewComment, Registration, User};

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use super::{Article, Comment, Error, Logger, NewsApi, Result};
}
