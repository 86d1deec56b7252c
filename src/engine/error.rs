//! Query execution errors.

use thiserror::Error;

use crate::pool::{PoolError, SourceError};
use crate::repository::{RepositoryError, ResourceKind};
use crate::validation::ValidationError;

/// Broad category of a [`QueryError`], for mapping to response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad request content. Never retried.
    Validation,
    /// The caller may not see the resource.
    Security,
    /// The connector is not usable in its current state.
    State,
    /// Pool creation or statement execution failed upstream.
    Connection,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Access denied: {0} not found")]
    AccessDenied(ResourceKind),

    #[error("Connector is not approved: {name}")]
    NotApproved { name: String },

    #[error("Connector is inactive: {name}")]
    Inactive { name: String },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Failed to execute query for {kind} {id}: {source}")]
    Execution {
        kind: ResourceKind,
        id: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    NotFound(RepositoryError),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Stored {what} for {kind} {id} is invalid: {source}")]
    CorruptMetadata {
        kind: ResourceKind,
        id: String,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::Validation,
            QueryError::AccessDenied(_) => ErrorKind::Security,
            QueryError::NotApproved { .. } | QueryError::Inactive { .. } => ErrorKind::State,
            QueryError::Pool(PoolError::Inactive(_)) => ErrorKind::State,
            QueryError::Pool(_) | QueryError::Execution { .. } => ErrorKind::Connection,
            QueryError::NotFound(_) => ErrorKind::NotFound,
            QueryError::Unavailable(_) | QueryError::CorruptMetadata { .. } => ErrorKind::Internal,
        }
    }
}

impl From<RepositoryError> for QueryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => QueryError::NotFound(err),
            RepositoryError::Unavailable(reason) => QueryError::Unavailable(reason),
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
