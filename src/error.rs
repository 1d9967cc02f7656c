//! Error taxonomy for the library-item core.
//!
//! Every failure detected by a value object, aggregate root or repository
//! is raised synchronously from the call that detects it and propagates to
//! the service boundary, where [`Error::status_code`] gives the status the
//! presentation layer should answer with.

use crate::storage::StorageError;

/// Result type for domain and repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the versioning core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A sibling entity already holds a value that must be unique.
    #[error("{entity} with {field} '{value}' already exists.")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    /// A lifecycle guard failed.
    #[error("{0}")]
    BusinessLogic(String),

    /// An attribute-level invariant failed.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// A referenced entity does not exist.
    #[error("{entity} with UID '{uid}' doesn't exist.")]
    NotFound { entity: String, uid: String },

    /// The persistence collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    BusinessLogic,
    Validation,
    NotFound,
    /// Another writer committed first.
    Conflict,
    Internal,
}

impl Error {
    pub fn business_logic(msg: impl Into<String>) -> Self {
        Error::BusinessLogic(msg.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, uid: impl Into<String>) -> Self {
        Error::NotFound {
            entity: entity.into(),
            uid: uid.into(),
        }
    }

    pub fn already_exists(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Error::AlreadyExists {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Classify the error.
    ///
    /// Storage failures that carry domain meaning (a uniqueness constraint
    /// enforced by the store, a missing entity) classify like their domain
    /// counterparts.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::BusinessLogic(_) => ErrorKind::BusinessLogic,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Storage(e) => match e {
                StorageError::UniqueViolation { .. } | StorageError::AlreadyExists { .. } => {
                    ErrorKind::AlreadyExists
                }
                StorageError::NotFound { .. } => ErrorKind::NotFound,
                StorageError::SequenceConflict { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
        }
    }

    /// HTTP-equivalent status code for the error kind.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::AlreadyExists | ErrorKind::Conflict => 409,
            ErrorKind::BusinessLogic | ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }

    /// Name of the offending field, for errors that have one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::AlreadyExists { field, .. } | Error::Validation { field, .. } => Some(field),
            Error::Storage(StorageError::UniqueViolation { property, .. }) => Some(property),
            _ => None,
        }
    }
}

/// Require that a business rule holds.
pub fn require(condition: bool, msg: impl Into<String>) -> Result<()> {
    if !condition {
        return Err(Error::BusinessLogic(msg.into()));
    }
    Ok(())
}
