use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlankoError>;

#[derive(Debug, Error)]
pub enum PlankoError {
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error("Board member not found: {0}")]
    MemberNotFound(String),

    #[error("Column {column_id} is not on board {board_id}")]
    ForeignColumn { column_id: String, board_id: String },

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid priority '{0}'. Valid priorities: low, medium, high")]
    InvalidPriority(String),

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Invite link is invalid or has expired")]
    InvalidInvite,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Storage backend '{0}' is not enabled in this build")]
    UnsupportedBackend(String),

    #[cfg(feature = "sqlite-storage")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("External service error: {0}")]
    External(#[from] anyhow::Error),

    #[error("{0}")]
    Other(String),
}
