use thiserror::Error;

use crate::api::ApiError;

/// Failure of a user-facing operation. Every variant is also shown through
/// `Notices` before it is returned.
#[derive(Error, Debug)]
pub enum BadgeSyncError {
    /// Missing backend URL, OAuth client id or redirect URI.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("You must be logged in to do that")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Badge sync has been shut down")]
    Disposed,
}
