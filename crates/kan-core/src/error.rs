use thiserror::Error;

use crate::schema::SchemaKind;

#[derive(Error, Debug)]
pub enum KanError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("No kan project at {0} (run `kan init` to create one)")]
    NotInitialized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} file {path} has no schema tag (run `kan migrate` to upgrade it)")]
    MissingSchema { kind: SchemaKind, path: String },

    #[error("{kind} file {path} has schema {found}, expected {expected} (run `kan migrate`)")]
    InvalidSchema {
        kind: SchemaKind,
        path: String,
        found: String,
        expected: String,
    },

    #[error("{kind} file {path} has schema {found}, which requires kan {min_engine} or newer")]
    FutureSchema {
        kind: SchemaKind,
        path: String,
        found: String,
        min_engine: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KanError {
    /// True for the schema-mismatch family that `kan migrate` resolves.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSchema { .. } | Self::InvalidSchema { .. } | Self::FutureSchema { .. }
        )
    }
}
