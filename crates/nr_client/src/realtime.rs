//! Simulated realtime comment feed.
//!
//! While connected to an article, a background task fabricates a comment on a
//! fixed random cadence, hands it to the comments store and broadcasts it to
//! subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use nr_core::date::now_iso;
use nr_core::{Comment, Error, Logger, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::comments::CommentsStore;

pub struct Author {
    pub name: &'static str,
    pub avatar: &'static str,
}

pub static AUTHORS: [Author; 7] = [
    Author { name: "Катерина", avatar: "https://i.pravatar.cc/150?img=5" },
    Author { name: "Влад", avatar: "https://i.pravatar.cc/150?img=8" },
    Author { name: "Іван", avatar: "https://i.pravatar.cc/150?img=9" },
    Author { name: "Марія", avatar: "https://i.pravatar.cc/150?img=12" },
    Author { name: "Олександр", avatar: "https://i.pravatar.cc/150?img=20" },
    Author { name: "Анна", avatar: "https://i.pravatar.cc/150?img=32" },
    Author { name: "Петро", avatar: "https://i.pravatar.cc/150?img=27" },
];

pub static MESSAGES: [&str; 8] = [
    "Дуже цікава новина!",
    "Я не згоден з цим.",
    "Дякую за інформацію!",
    "Це змінило моє сприйняття теми.",
    "Чи є додаткові джерела?",
    "Треба більше таких новин!",
    "Не знав про це, дякую.",
    "Цікаво, як це вплине на ситуацію.",
];

/// Bounds of the firing period in milliseconds, upper bound exclusive.
pub const PERIOD_MS: (u64, u64) = (8_000, 15_000);

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorState {
    pub is_connected: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct Inner {
    state: SimulatorState,
    /// Bumped whenever the running timer is replaced or stopped; a task only
    /// delivers while its generation is current.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Inner {
    fn stop(&mut self) -> bool {
        self.generation += 1;
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

pub struct RealtimeSimulator {
    comments: Arc<CommentsStore>,
    logger: Logger,
    events: broadcast::Sender<Comment>,
    inner: Arc<Mutex<Inner>>,
}

impl RealtimeSimulator {
    pub fn new(comments: Arc<CommentsStore>, logger: Logger) -> Self {
        let logger = logger.with_prefix("[WebSocket]");
        logger.info("Initializing realtime feed", Value::Null);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            comments,
            logger,
            events,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    /// Starts the feed for `news_id`, replacing any running one. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self, news_id: i64) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::External(anyhow::anyhow!("Realtime feed needs a tokio runtime: {}", e)))?;

        let mut inner = self.lock();
        if inner.stop() {
            self.logger.debug("Stopping mock comment generation", Value::Null);
        }

        let period = Duration::from_millis(rand::thread_rng().gen_range(PERIOD_MS.0..PERIOD_MS.1));
        let feed = Feed {
            comments: self.comments.clone(),
            logger: self.logger.clone(),
            events: self.events.clone(),
            inner: self.inner.clone(),
            generation: inner.generation,
            news_id,
        };

        inner.state = SimulatorState {
            is_connected: true,
            error: None,
        };
        inner.task = Some(runtime.spawn(feed.run(period)));

        self.logger.info("WebSocket connection", json!({ "newsId": news_id }));
        self.logger.debug(
            "Mock comment generation started",
            json!({ "newsId": news_id, "intervalMs": period.as_millis() as u64 }),
        );
        Ok(())
    }

    /// Stops the feed. Once this returns no further comment is delivered.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.state.is_connected = false;
        if inner.stop() {
            self.logger.info("WebSocket disconnection", Value::Null);
        }
    }

    /// Application teardown.
    pub fn shutdown(&self) {
        self.logger
            .debug("App before leave - stopping comment generation", Value::Null);
        self.disconnect();
    }

    pub fn handle_error(&self, message: &str) {
        let message = if message.trim().is_empty() {
            "WebSocket connection error"
        } else {
            message
        };
        let mut inner = self.lock();
        inner.state = SimulatorState {
            is_connected: false,
            error: Some(message.to_string()),
        };
        inner.stop();
        self.logger.error("WebSocket error", json!({ "error": message }));
    }

    pub fn state(&self) -> SimulatorState {
        self.lock().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().state.is_connected
    }

    /// New realtime comments, as they are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<Comment> {
        self.events.subscribe()
    }
}

impl Drop for RealtimeSimulator {
    fn drop(&mut self) {
        self.lock().stop();
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Feed {
    comments: Arc<CommentsStore>,
    logger: Logger,
    events: broadcast::Sender<Comment>,
    inner: Arc<Mutex<Inner>>,
    generation: u64,
    news_id: i64,
}

impl Feed {
    async fn run(self, period: Duration) {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if !self.deliver(synthesize(self.news_id)) {
                break;
            }
        }
    }

    /// Delivers under the simulator lock so that a concurrent `disconnect`
    /// either waits for this delivery or prevents it.
    fn deliver(&self, comment: Comment) -> bool {
        let inner = lock_inner(&self.inner);
        if inner.generation != self.generation {
            return false;
        }

        self.comments.handle_new_comment(comment.clone());
        self.logger.debug(
            "New realtime comment received",
            json!({
                "commentId": comment.id,
                "newsId": comment.news_id,
                "author": comment.author,
            }),
        );
        // No subscribers is fine.
        let _ = self.events.send(comment);
        drop(inner);
        true
    }
}

/// A random comment from the fixed roster and phrase set.
pub fn synthesize(news_id: i64) -> Comment {
    let mut rng = rand::thread_rng();
    let author = AUTHORS.choose(&mut rng).unwrap_or(&AUTHORS[0]);
    let content = MESSAGES.choose(&mut rng).copied().unwrap_or(MESSAGES[0]);

    Comment {
        id: Utc::now().timestamp_millis() + rng.gen_range(0..1000),
        news_id,
        author: author.name.to_string(),
        avatar_url: author.avatar.to_string(),
        content: content.to_string(),
        created_at: now_iso(),
        formatted_date: None,
        likes: rng.gen_range(0..5),
        is_user_comment: false,
        is_local_comment: false,
        is_realtime: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use nr_storage::MemoryStorage;

    fn setup() -> (Arc<CommentsStore>, RealtimeSimulator) {
        let comments = Arc::new(CommentsStore::new(
            Arc::new(MockApi::new()),
            Arc::new(MemoryStorage::new()),
            Logger::default(),
        ));
        let simulator = RealtimeSimulator::new(comments.clone(), Logger::default());
        (comments, simulator)
    }

    #[test]
    fn test_synthesized_comment_shape() {
        let comment = synthesize(42);
        assert_eq!(comment.news_id, 42);
        assert!(comment.likes < 5);
        assert!(AUTHORS.iter().any(|a| a.name == comment.author && a.avatar == comment.avatar_url));
        assert!(MESSAGES.contains(&comment.content.as_str()));
        assert!(!comment.is_realtime);
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let (_, simulator) = setup();
        assert!(simulator.connect(1).is_err());
        assert!(!simulator.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_once_per_period() {
        let (comments, simulator) = setup();
        let mut events = simulator.subscribe();
        simulator.connect(7).unwrap();
        assert!(simulator.is_connected());

        time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(comments.comments_count(7), 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.news_id, 7);
        let stored = &comments.comments_by_news_id(7)[0];
        assert!(stored.is_realtime);
        assert_eq!(stored.id, event.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_right_after_connect() {
        let (comments, simulator) = setup();
        simulator.connect(7).unwrap();
        simulator.disconnect();
        simulator.disconnect();

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(comments.comments_count(7), 0);
        assert_eq!(simulator.state(), SimulatorState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_replaces_timer() {
        let (comments, simulator) = setup();
        simulator.connect(1).unwrap();
        simulator.connect(2).unwrap();

        time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(comments.comments_count(1), 0);
        assert_eq!(comments.comments_count(2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_and_error_stop_the_feed() {
        let (comments, simulator) = setup();
        simulator.connect(3).unwrap();
        drop(simulator);

        let (others, failing) = setup();
        failing.connect(4).unwrap();
        failing.handle_error("");
        assert_eq!(failing.state().error.as_deref(), Some("WebSocket connection error"));
        assert!(!failing.is_connected());

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(comments.comments_count(3), 0);
        assert_eq!(others.comments_count(4), 0);
    }
}
