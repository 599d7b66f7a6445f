//! Core types and traits for step handlers

use crate::config::StepParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Tagged result every handler operation returns
///
/// Expected failures (missing folder, bad selector, HTTP 404) are reported as
/// `Failure`; `HandlerError` is reserved for faults the handler could not
/// classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Success(T),
    Failure { message: String },
}

impl<T> Outcome<T> {
    /// Create a failure outcome
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Exceptional handler conditions
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Filesystem error the handler did not anticipate
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be built or used
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// A dependency the handler needs is missing
    #[error("handler unavailable: {message}")]
    Unavailable { message: String },

    /// Script sandbox broke down
    #[error("script error: {message}")]
    Script { message: String },
}

impl HandlerError {
    /// Create an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

pub type HandlerResult<T> = Result<Outcome<T>, HandlerError>;

/// Copy or move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Copy,
    Move,
}

impl TransferMode {
    /// Past participle used in summaries
    pub fn verb(&self) -> &'static str {
        match self {
            TransferMode::Copy => "copied",
            TransferMode::Move => "moved",
        }
    }
}

/// File operations handler
#[async_trait]
pub trait FileOperations: Send + Sync {
    /// Copy or move every file in `source_dir` whose name ends with `extension`
    async fn copy_or_move(
        &self,
        source_dir: &str,
        dest_dir: &str,
        extension: Option<&str>,
        mode: TransferMode,
    ) -> HandlerResult<String>;
}

/// Web scraping handler
#[async_trait]
pub trait WebScraper: Send + Sync {
    /// Fetch `url` and return its visible text, or the text of `selector` matches
    async fn extract_content(&self, url: &str, selector: Option<&str>) -> HandlerResult<String>;
}

/// Custom script evaluation context
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Evaluate `code`; the payload is whatever the script produced
    async fn run(&self, code: &str, params: &StepParams) -> HandlerResult<String>;
}
