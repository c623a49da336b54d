use thiserror::Error;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("'{name}' already exists")]
    AlreadyExists { name: String },

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Could not determine project directories")]
    NoProjectDirs,
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
