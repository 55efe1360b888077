//! Primary media selection and transfers
//!
//! Primary files are downloaded one at a time into a `.part` sibling and
//! renamed into place on success, so the destination only ever holds a
//! complete file. Small transfers (thumbnails, attachments) are read into
//! memory and go into the item's bundle.

use super::Mirror;
use crate::client::ApiError;
use crate::config::RetryConfig;
use crate::error::{DownloadError, Error, Result};
use crate::retry::{RetryFailure, download_with_retry};
use crate::sanitize::sanitize;
use crate::types::{MediaModes, MirrorStats, VideoEntry};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Outcome of choosing which encoding mode to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimarySelection {
    /// Download this mode's resource
    Download {
        /// Mode name
        mode: String,
        /// File extension
        format: String,
        /// Resource URL as listed by the server
        url: String,
    },
    /// The preferred mode has no downloadable file
    Unusable {
        /// Mode name
        mode: String,
    },
    /// The item lists no modes at all
    NoModes,
}

/// Pick the mode to download
///
/// Modes whose resource carries both a format and a URL come first; the sort
/// is stable, so server order decides among them.
pub fn select_primary(modes: &MediaModes) -> PrimarySelection {
    let mut names: Vec<&String> = modes.names.iter().collect();
    names.sort_by_key(|name| {
        modes
            .resource(name)
            .is_none_or(|r| r.format.is_none() || r.url.is_none())
    });

    let Some(mode) = names.first() else {
        return PrimarySelection::NoModes;
    };
    match modes.resource(mode) {
        Some(resource) => match (resource.format, resource.url) {
            (Some(format), Some(url)) => PrimarySelection::Download {
                mode: mode.to_string(),
                format,
                url,
            },
            _ => PrimarySelection::Unusable {
                mode: mode.to_string(),
            },
        },
        None => PrimarySelection::Unusable {
            mode: mode.to_string(),
        },
    }
}

/// Turn the final error of a retry loop into a [`DownloadError`]
pub(crate) fn terminal_failure(url: &str, failure: RetryFailure<ApiError>) -> DownloadError {
    if failure.exhausted() {
        DownloadError::RetriesExhausted {
            url: url.to_string(),
            attempts: failure.attempts,
            source: failure.error,
        }
    } else {
        DownloadError::Permanent {
            url: url.to_string(),
            source: failure.error,
        }
    }
}

/// Parse (and thereby re-quote) a media URL, resolving it against the server if relative
pub(crate) fn resolve_media_url(raw: &str, server_base: &str) -> std::result::Result<url::Url, DownloadError> {
    let invalid = |e: url::ParseError| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    };
    match url::Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(&format!("{server_base}/"))
            .and_then(|base| base.join(raw))
            .map_err(invalid),
        Err(e) => Err(invalid(e)),
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl Mirror {
    /// Download the selected primary media of `video` into `dir` unless present
    pub(crate) async fn mirror_primary(
        &self,
        dir: &Path,
        video: &VideoEntry,
        modes: &Value,
        stats: &mut MirrorStats,
    ) -> Result<()> {
        let modes = MediaModes::from_value(modes)?;
        match select_primary(&modes) {
            PrimarySelection::Download { mode, format, url } => {
                let destination = dir.join(sanitize(&format!("{}.{}", video.title, format)));
                if tokio::fs::try_exists(&destination).await? {
                    tracing::debug!(path = %destination.display(), "Primary media already present");
                    stats.primaries_present += 1;
                    return Ok(());
                }

                tracing::info!(
                    oid = %video.oid,
                    mode = %mode,
                    modes = ?modes.names,
                    url = %url,
                    path = %destination.display(),
                    "Downloading primary media"
                );
                self.fetch_primary(&url, &destination, &self.config.primary_retry)
                    .await?;
                stats.primaries_downloaded += 1;
            }
            PrimarySelection::Unusable { mode } => {
                tracing::error!(
                    oid = %video.oid,
                    title = %video.title,
                    mode = %mode,
                    "No downloadable format for this item, skipping"
                );
                stats.primaries_unavailable += 1;
            }
            PrimarySelection::NoModes => {
                tracing::error!(
                    oid = %video.oid,
                    title = %video.title,
                    "Item lists no modes, don't know what to download"
                );
                stats.primaries_unavailable += 1;
            }
        }
        Ok(())
    }

    /// Download `url` to `destination`, retrying transient failures
    ///
    /// Nothing is written when `destination` already exists. Bytes go to a
    /// `.part` file that is renamed on success and deleted when the last
    /// attempt fails.
    ///
    /// # Errors
    ///
    /// [`DownloadError::RetriesExhausted`] when every attempt in `retry` failed,
    /// [`DownloadError::Permanent`] for failures retrying cannot fix.
    pub async fn fetch_primary(
        &self,
        url: &str,
        destination: &Path,
        retry: &RetryConfig,
    ) -> Result<()> {
        if tokio::fs::try_exists(destination).await? {
            return Ok(());
        }

        let link = resolve_media_url(url, self.config.server_base())?;
        let link = link.as_str();
        let part = part_path(destination);
        let client = &self.client;
        let timeout = self.config.timeouts.transfer;
        let part_ref = part.as_path();

        let result = download_with_retry(retry, move || async move {
            let response = client.request(link, timeout).await?;
            let mut file = tokio::fs::File::create(part_ref).await?;
            let bytes = response.write_to(&mut file).await?;
            file.sync_all().await?;
            Ok::<_, ApiError>(bytes)
        })
        .await;

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&part, destination).await?;
                if !tokio::fs::try_exists(destination).await? {
                    return Err(DownloadError::MissingAfterSuccess {
                        path: destination.to_path_buf(),
                    }
                    .into());
                }
                tracing::info!(path = %destination.display(), bytes, "Primary media downloaded");
                Ok(())
            }
            Err(failure) => {
                tracing::info!(
                    path = %destination.display(),
                    "Download canceled, incomplete file will be deleted"
                );
                remove_if_present(&part).await?;
                remove_if_present(destination).await?;
                Err(Error::Download(terminal_failure(link, failure)))
            }
        }
    }

    /// Fetch an attachment with the attachment retry policy
    pub async fn fetch_attachment(
        &self,
        url: &str,
    ) -> std::result::Result<Vec<u8>, RetryFailure<ApiError>> {
        self.fetch_bytes(url, &self.config.attachment_retry).await
    }

    /// Fetch a small resource into memory
    pub(crate) async fn fetch_bytes(
        &self,
        url: &str,
        retry: &RetryConfig,
    ) -> std::result::Result<Vec<u8>, RetryFailure<ApiError>> {
        let client = &self.client;
        let timeout = self.config.timeouts.transfer;
        download_with_retry(retry, move || async move {
            client.request(url, timeout).await?.into_bytes().await
        })
        .await
    }
}
