//! Error types shared by the services.
//!
//! Verification and content errors are caller mistakes (4xx); store errors are
//! infrastructure failures (5xx) after which the unit of work has been rolled
//! back.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifyError {
    /// The submitted value does not have the shape the exercise type expects.
    #[error("invalid answer format: expected {expected}")]
    InvalidAnswerFormat { expected: &'static str },

    /// A matching answer element is not exactly two strings.
    #[error("invalid answer format: each pair must be [term, definition]")]
    MalformedPair,

    #[error("unsupported exercise type: {0}")]
    UnsupportedExerciseType(String),

    /// Exercise content whose answer key cannot be decoded.
    #[error("invalid exercise definition {exercise_id}: {reason}")]
    InvalidDefinition { exercise_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("failed to read content from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ContentError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ContentError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// The unit of work was used after commit or rollback.
    #[error("unit of work already finished")]
    Finished,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a complete exercise attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
