// ABOUTME: Error types for the story-slides application
// ABOUTME: Provides structured error handling for library loading, media probing and serving

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to fetch remote media: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to decode image {path}: {message}")]
    ImageError { path: PathBuf, message: String },

    #[error("Invalid media source: {0}")]
    InvalidMediaSource(String),

    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("Slide library error: {0}")]
    LibraryError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("No pages found matching pattern: {0}")]
    NoPagesFoundError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Preference store error: {0}")]
    PreferenceError(String),

    #[error("Server error: {0}")]
    ServeError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

// Implement conversion from anyhow::Error to our StoryError
impl From<anyhow::Error> for StoryError {
    fn from(err: anyhow::Error) -> Self {
        StoryError::UnknownError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;
