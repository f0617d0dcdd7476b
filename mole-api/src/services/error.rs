use service_core::error::{AppError, CODE_INVALID_TOKEN};

use super::{KeySetError, ProfileError, StorageError, TokenError};
use crate::query::QueryError;

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::unauthenticated(CODE_INVALID_TOKEN, err.to_string())
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<KeySetError> for AppError {
    fn from(err: KeySetError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnknownColumn(column) => {
                tracing::warn!(column = %column, "Query references an unknown column");
                AppError::InternalError(anyhow::anyhow!("Unable to build the query"))
            }
            other => AppError::BadRequest(anyhow::Error::new(other)),
        }
    }
}
