use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// One structured diagnostics record.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub data: Value,
}

/// Summary of an HTTP response attached to API request logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub status: u16,
    pub status_text: String,
    pub has_data: bool,
}

/// Leveled diagnostics sink.
///
/// Records below `min_level` are dropped and the call returns `None`; everything
/// else is forwarded to `tracing` and handed back to the caller.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    prefixes: Vec<String>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

impl Logger {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            prefixes: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn log(&self, level: LogLevel, message: &str, data: Value) -> Option<LogEntry> {
        if level < self.min_level {
            return None;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            data,
        };
        self.emit(&entry);
        Some(entry)
    }

    fn emit(&self, entry: &LogEntry) {
        let prefix = self.prefixes.iter().map(|p| format!("{} ", p)).collect::<String>();
        let data = &entry.data;
        match entry.level {
            LogLevel::Debug => tracing::debug!(%data, "{}{}", prefix, entry.message),
            LogLevel::Info => tracing::info!(%data, "{}{}", prefix, entry.message),
            LogLevel::Warn => tracing::warn!(%data, "{}{}", prefix, entry.message),
            LogLevel::Error => tracing::error!(%data, "{}{}", prefix, entry.message),
        }
    }

    pub fn debug(&self, message: &str, data: Value) -> Option<LogEntry> {
        self.log(LogLevel::Debug, message, data)
    }

    pub fn info(&self, message: &str, data: Value) -> Option<LogEntry> {
        self.log(LogLevel::Info, message, data)
    }

    pub fn warn(&self, message: &str, data: Value) -> Option<LogEntry> {
        self.log(LogLevel::Warn, message, data)
    }

    pub fn error(&self, message: &str, data: Value) -> Option<LogEntry> {
        self.log(LogLevel::Error, message, data)
    }

    pub fn log_info(&self, message: &str, data: Value) -> Option<LogEntry> {
        self.info(message, data)
    }

    /// Logs an error value together with its type name and source chain.
    pub fn log_error<E>(&self, error: &E, context: Value) -> Option<LogEntry>
    where
        E: std::error::Error,
    {
        let mut stack = Vec::new();
        let mut source = error.source();
        while let Some(err) = source {
            stack.push(Value::String(err.to_string()));
            source = err.source();
        }

        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(error.to_string()));
        data.insert(
            "name".to_string(),
            Value::String(std::any::type_name::<E>().to_string()),
        );
        data.insert("stack".to_string(), Value::Array(stack));
        merge_context(&mut data, context);

        self.error(&error.to_string(), Value::Object(data))
    }

    /// Logs a failure that is not an `Error` value, e.g. a plain message.
    pub fn log_failure(&self, failure: impl fmt::Display, context: Value) -> Option<LogEntry> {
        let message = failure.to_string();
        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(message.clone()));
        merge_context(&mut data, context);
        self.error(&message, Value::Object(data))
    }

    pub fn log_user_action(&self, action: &str, details: Value) -> Option<LogEntry> {
        self.info(
            &format!("User action: {}", action),
            json!({
                "action": action,
                "details": details,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
    }

    pub fn log_api_request(
        &self,
        endpoint: &str,
        request: Value,
        response: Option<&ResponseSummary>,
        error: Option<&dyn std::error::Error>,
    ) -> Option<LogEntry> {
        let mut data = Map::new();
        data.insert("endpoint".to_string(), Value::String(endpoint.to_string()));
        data.insert("request".to_string(), request);
        data.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));

        if let Some(response) = response {
            data.insert(
                "response".to_string(),
                serde_json::to_value(response).unwrap_or(Value::Null),
            );
        }

        match error {
            Some(error) => {
                data.insert("error".to_string(), json!({ "message": error.to_string() }));
                self.error(&format!("API request failed: {}", endpoint), Value::Object(data))
            }
            None => self.debug(&format!("API request: {}", endpoint), Value::Object(data)),
        }
    }

    pub fn log_performance(
        &self,
        operation: &str,
        start: Instant,
        end: Option<Instant>,
    ) -> Option<LogEntry> {
        let end = end.unwrap_or_else(Instant::now);
        let duration = end.saturating_duration_since(start);
        self.debug(
            &format!("Performance: {}", operation),
            json!({
                "operation": operation,
                "duration": format!("{:.2}ms", duration.as_secs_f64() * 1000.0),
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
    }
}

fn merge_context(data: &mut Map<String, Value>, context: Value) {
    match context {
        Value::Object(map) => data.extend(map),
        Value::Null => {}
        other => {
            data.insert("context".to_string(), other);
        }
    }
}

/// Installs the global `tracing` subscriber once.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: LogLevel) {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        });
    }
}
