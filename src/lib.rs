//! # mediaserver-mirror
//!
//! Resumable mirror of a media server's channel tree onto local disk.
//!
//! Every channel becomes a directory holding a `data.json` snapshot of its
//! listing. Every ready video yields its primary media file and a zip bundle
//! with its metadata, thumbnail and attachments.
//!
//! ## Design Philosophy
//!
//! - **Idempotent** - A second run over an unchanged tree issues no requests
//!   and changes no bytes
//! - **Resumable** - A killed run leaves nothing that looks complete but is not;
//!   bundles are completed member by member on the next run
//! - **Cheap to restart** - API responses are cached on disk, so a fatal error
//!   costs only the work since the last run
//!
//! ## Quick Start
//!
//! ```no_run
//! use mediaserver_mirror::{Config, Mirror};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("/srv/mirror", std::env::var("MEDIASERVER_API_KEY")?);
//!     let mirror = Mirror::new(config).await?;
//!
//!     let stats = mirror.run().await?;
//!     println!("{stats}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Persistent response and completion caches
pub mod cache;
/// Remote API capability and its reqwest implementation
pub mod client;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Request keys for the remote endpoints
pub mod endpoints;
/// Error types
pub mod error;
/// Tree walk, bundle assembly and downloads
pub mod mirror;
/// Bounded retry logic
pub mod retry;
/// Filesystem-safe names
pub mod sanitize;
/// Payload views and run statistics
pub mod types;

// Re-export commonly used types
pub use cache::{CompletionCache, ResponseCache};
pub use client::{ApiClient, ApiError, MediaServerClient};
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use mirror::Mirror;
pub use sanitize::sanitize;
pub use types::{MirrorStats, NodeId, VideoEntry};

/// Run the mirror until it finishes or a termination signal arrives.
///
/// Returns `None` when interrupted. Stopping between awaits is safe: partial
/// primary files only ever exist as `.part` files and bundles are completed on
/// the next run.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mediaserver_mirror::{Config, Mirror, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mirror = Mirror::new(Config::new("/srv/mirror", "key")).await?;
///
///     if let Some(stats) = run_with_shutdown(&mirror).await? {
///         println!("{stats}");
///     }
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(mirror: &Mirror) -> Result<Option<MirrorStats>> {
    tokio::select! {
        result = mirror.run() => result.map(Some),
        _ = wait_for_signal() => {
            tracing::warn!("Mirror interrupted, rerun to resume");
            Ok(None)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (sigterm, sigint) => {
            let error = sigterm.err().or(sigint.err()).map(|e| e.to_string());
            tracing::warn!(error = ?error, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
