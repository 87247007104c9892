// Error types for the reader engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    /// Summarization or synthesis failed or came back empty
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A provisioning result arrived for an article that is no longer open
    #[error("Stale result for article {requested} (active: {active})")]
    StaleResult { requested: String, active: String },

    /// Persisted reading progress could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Playback was requested before any audio was attached
    #[error("No audio loaded")]
    NoAudio,

    #[error("No article is open")]
    NoArticle,

    /// Audio output backend failure
    #[error("Audio backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ReaderError>;
