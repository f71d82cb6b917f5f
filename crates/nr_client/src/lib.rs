pub mod api;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod comments;
mod flag;
mod persist;
pub mod query;
pub mod realtime;

#[cfg(test)]
mod testing;

pub use api::HttpNewsApi;
pub use app::NewsApp;
pub use auth::{AuthStore, Session};
pub use catalog::CatalogStore;
pub use comments::CommentsStore;
pub use query::{CatalogSnapshot, QueryState, SortKey, SortOrder};
pub use realtime::{RealtimeSimulator, SimulatorState};

pub mod prelude {
    pub use super::{
        AuthStore, CatalogStore, CommentsStore, NewsApp, RealtimeSimulator, SortKey, SortOrder,
    };
    pub use nr_core::{Article, Comment, Error, Result};
}
