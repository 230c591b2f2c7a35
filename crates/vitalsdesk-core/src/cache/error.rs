use thiserror::Error;

use crate::api::ApiError;

use super::endpoint::EndpointKind;
use super::key::CacheKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Nothing cached for {0}")]
    NotCached(CacheKey),

    #[error("Endpoint '{name}' is a {actual}, not a {expected}")]
    WrongKind {
        name: String,
        expected: EndpointKind,
        actual: EndpointKind,
    },

    #[error("Endpoint '{0}' is already registered")]
    DuplicateEndpoint(String),

    #[error("Query store has been disposed")]
    Disposed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// The backend error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CacheError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.api_error().and_then(ApiError::status)
    }
}
