// src/error.rs

/// Errors surfaced by the learning core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("profile for user {user_id} kept changing underneath us after {attempts} attempts")]
    StaleProfile { user_id: i64, attempts: u32 },

    #[error("unknown exercise {0}")]
    UnknownExercise(i64),

    #[error("feedback generator unavailable: {0}")]
    FeedbackUnavailable(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
