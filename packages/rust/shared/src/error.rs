//! Error types for newsreader.
//!
//! Library crates use [`NewsReaderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all newsreader operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsReaderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A pipeline stage was constructed with missing or invalid parameters.
    #[error("build error: {message}")]
    Build { message: String },

    /// Network/HTTP error while talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Event log or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Inference server returned something unusable.
    #[error("inference error: {0}")]
    Inference(String),

    /// BIO span assembly on malformed input.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// JSON (de)serialization of an article failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(String),

    /// A crawler failed during the collection stage.
    #[error("could not crawl resource={resource}: {source}")]
    Crawl {
        resource: String,
        source: Box<NewsReaderError>,
    },

    /// Publishing an article failed.
    #[error("could not publish article with id={article_id}: {source}")]
    Publish {
        article_id: String,
        source: Box<NewsReaderError>,
    },

    /// A processor in the operator chain failed on one article.
    #[error("processor={processor} on article with id={article_id} failed: {source}")]
    Process {
        processor: String,
        article_id: String,
        source: Box<NewsReaderError>,
    },

    /// Every failure recorded during one operator run.
    #[error("operate error, {} failure(s): {}", .errors.len(), join_messages(.errors))]
    Operate { errors: Vec<NewsReaderError> },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsReaderError>;

impl NewsReaderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a build error from any displayable message.
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn join_messages(errors: &[NewsReaderError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
