// Store error types shared by repositories and services
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matches the external identifier
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Request content rejected before touching the database
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    /// Stored data that the code cannot interpret (schema or code drift)
    #[error("unexpected: {0}")]
    Unexpected(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
