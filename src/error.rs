use thiserror::Error;

use crate::db::DbError;

/// Failures surfaced by the access, lifecycle and chat layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Error::NotFound(msg),
            DbError::Validation(msg) => Error::Validation(msg),
            DbError::Conflict(msg) => Error::Conflict(msg),
            other => Error::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_kind() {
        assert!(matches!(Error::from(DbError::NotFound("Task 1".into())), Error::NotFound(_)));
        assert!(matches!(Error::from(DbError::Conflict("dup".into())), Error::Conflict(_)));
        assert!(matches!(Error::from(DbError::Validation("bad".into())), Error::Validation(_)));
        assert!(matches!(Error::from(DbError::Lock("poisoned".into())), Error::Store(_)));
    }
}
