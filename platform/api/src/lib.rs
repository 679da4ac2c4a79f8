use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal error surfaced to client");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        match self {
            ApiError::InvalidInput(_) => {
                err = err.extend_with(|_err, e| {
                    e.set("type", "BAD_REQUEST");
                });
            }
            ApiError::Unavailable(_) => {
                err = err.extend_with(|_err, e| {
                    e.set("retryable", true);
                });
            }
            _ => {}
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
