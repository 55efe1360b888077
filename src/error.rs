//! Error types for mediaserver-mirror
//!
//! This module provides the error taxonomy for the mirror:
//! - Configuration errors, fatal before any work begins
//! - Listing errors, fatal for the whole run
//! - Stale-resource errors, fatal for one item only
//! - Download errors for the primary media transfer
//! - Wrappers for the I/O, database, HTTP, JSON and archive layers

use crate::client::ApiError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mediaserver-mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediaserver-mirror
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Remote API call failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The remote listing for a node did not report success
    #[error("listing failed for node {oid}")]
    ListingFailed {
        /// Identifier of the node that could not be listed
        oid: String,
    },

    /// A resource link derived from a cached listing has expired
    ///
    /// The implicated listing has already been refreshed in the response cache;
    /// the item it belongs to is skipped until the next run.
    #[error("stale resource {url} for item {oid} (listing of {parent} refreshed)")]
    StaleResource {
        /// Item the resource belongs to
        oid: String,
        /// Expired URL
        url: String,
        /// Node whose listing was refreshed
        parent: String,
    },

    /// Primary download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Persistent store error
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bundle archive error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error bound to a specific key
    pub fn config<S: Into<String>>(key: &str, message: S) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Persistent store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Primary media transfer errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every attempt in the retry budget failed
    #[error("download of {url} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Source URL
        url: String,
        /// Number of attempts made
        attempts: u32,
        /// Error of the final attempt
        #[source]
        source: ApiError,
    },

    /// The transfer failed with an error that retrying cannot fix
    #[error("download of {url} failed permanently: {source}")]
    Permanent {
        /// Source URL
        url: String,
        /// Classified failure
        #[source]
        source: ApiError,
    },

    /// The transfer reported success but the destination is missing
    #[error("download reported success but {path} does not exist")]
    MissingAfterSuccess {
        /// Expected destination
        path: PathBuf,
    },

    /// A mode's resource URL could not be parsed
    #[error("invalid media URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },
}
