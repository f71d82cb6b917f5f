use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Message suitable for a store's `error` field.
    ///
    /// Transport errors are reduced to their own text without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) | Error::Storage(msg) => msg.clone(),
            Error::Api { message, .. } => message.clone(),
            Error::Http(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
