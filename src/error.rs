//! Error type shared by the record file, store and configuration layers.
//!
//! The aggregation core never returns errors: bad anchors, bad dates and bad
//! effort values all degrade to a best-effort result. Errors only surface from
//! I/O around the core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store error for key '{key}': {message}")]
    Store { key: String, message: String },
}

impl Error {
    pub fn store(key: &str, message: impl Into<String>) -> Self {
        Error::Store {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
