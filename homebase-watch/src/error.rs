//! Error types for homebase-watch

use thiserror::Error;

use crate::geofence::GeofenceError;

/// Watch client errors
///
/// Feed errors never stop the polling loop; they skip one cycle.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Connection failure or timeout talking to the feed
    #[error("Feed unreachable: {0}")]
    FeedUnreachable(String),

    /// Feed answered with a non-success status
    #[error("Feed returned HTTP {status}: {detail}")]
    FeedStatus { status: u16, detail: String },

    /// Feed body is not a valid snapshot
    #[error("Feed response malformed: {0}")]
    FeedMalformed(String),

    #[error("Geofence: {0}")]
    Geofence(#[from] GeofenceError),

    /// Operator command could not be parsed
    #[error("Invalid command: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] homebase_common::Error),
}

/// Result type for watch operations
pub type WatchResult<T> = Result<T, WatchError>;
