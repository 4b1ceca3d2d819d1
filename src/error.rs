//! Error types for the recommendation engine.

use std::io;

use thiserror::Error;

use crate::model::UserId;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RecError>;

/// Errors surfaced by the recommendation engine.
///
/// Unknown users and items in similarity or scoring paths are not errors; they
/// resolve to zero scores or fallback lists. Only documented preconditions and
/// configuration problems reach the caller.
#[derive(Debug, Error)]
pub enum RecError {
    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    /// The user is not present in the graph store.
    #[error("user {0} not found")]
    UserNotFound(UserId),
    /// A caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The worker pool for a precompute pass could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for RecError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        RecError::ThreadPool(err.to_string())
    }
}
