use axum::http::StatusCode;
use thiserror::Error;

/// Errors coming back from a repository. `NotFound` is distinguished so the
/// profile store can run its create-on-first-access path; everything else is
/// carried as detail for the log only.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("row not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(String),
}

impl From<diesel::result::Error> for RepoError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => RepoError::NotFound,
            other => RepoError::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for RepoError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        RepoError::Database(format!("pool error: {e}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Update,
    Delete,
    Upload,
    Send,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Upload => "upload",
            Operation::Send => "send",
        }
    }
}

/// The error a store lets past its boundary. The message is deliberately
/// generic per operation kind; the underlying detail is logged where the
/// failure happened and never shown to the user.
#[derive(Debug, Error)]
#[error("Failed to {} {}. Please try again.", op.verb(), entity)]
pub struct StoreError {
    op: Operation,
    entity: &'static str,
}

impl StoreError {
    pub fn new(op: Operation, entity: &'static str) -> Self {
        Self { op, entity }
    }

    pub fn operation(&self) -> Operation {
        self.op
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Client-side validation failures. Caught before any network or storage
/// call; field-level, non-fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select an image file.")]
    NotAnImage,
    #[error("Please select an image smaller than 5MB.")]
    FileTooLarge,
    #[error("{0} is required.")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_messages_are_generic_per_operation() {
        assert_eq!(
            StoreError::new(Operation::Load, "leads").to_string(),
            "Failed to load leads. Please try again."
        );
        assert_eq!(
            StoreError::new(Operation::Delete, "URL").to_string(),
            "Failed to delete URL. Please try again."
        );
    }
}
