//! Per-item bundle assembly
//!
//! A bundle is a zip archive holding an item's non-video assets. Members are
//! written at most once: presence is checked before every write, so a bundle
//! left behind by an interrupted run is completed rather than rebuilt. After
//! each member the central directory is rewritten, which keeps the archive
//! readable between members.

use super::Mirror;
use crate::client::ApiError;
use crate::error::{Error, Result};
use crate::sanitize::sanitize;
use crate::types::{Annotations, MirrorStats, NodeId, VideoEntry};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Bundle member holding the raw media modes payload
pub const MEDIAS_MEMBER: &str = "medias.json";
/// Bundle member holding the raw annotations payload
pub const ANNOTATIONS_MEMBER: &str = "annotations.json";
/// Bundle member holding the full-size thumbnail
pub const THUMB_MEMBER: &str = "thumb.jpg";

/// Member name of the attachment at `index` (0-based) in the annotation list
pub fn attachment_member_name(index: usize, filename: &str) -> String {
    sanitize(&format!("{:06}_{}", index + 1, filename))
}

/// How one attachment transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentOutcome {
    Written,
    Forbidden,
    Failed,
}

impl Mirror {
    /// Make sure the bundle for `video` exists and holds every reachable member
    ///
    /// A bundle that exists and is marked complete is left alone. Otherwise
    /// the missing members are added; the bundle is marked complete once the
    /// mandatory members are present and no attachment failed for a reason
    /// other than being forbidden.
    ///
    /// # Errors
    ///
    /// [`Error::StaleResource`] when the thumbnail link has expired (the parent
    /// listing is refreshed first). Attachment failures never surface here.
    pub(crate) async fn ensure_bundle(
        &self,
        parent: &NodeId,
        video: &VideoEntry,
        path: &Path,
        modes: &Value,
        annotations: &Value,
        stats: &mut MirrorStats,
    ) -> Result<()> {
        if tokio::fs::try_exists(path).await? && self.completions.is_complete(path).await {
            tracing::debug!(path = %path.display(), "Bundle already complete");
            stats.bundles_complete += 1;
            return Ok(());
        }

        tracing::info!(oid = %video.oid, path = %path.display(), "Building bundle");
        let bundle = Bundle::open(path).await?;
        stats.bundles_built += 1;

        bundle
            .write_member(MEDIAS_MEMBER.to_string(), serde_json::to_vec(modes)?)
            .await?;
        bundle
            .write_member(ANNOTATIONS_MEMBER.to_string(), serde_json::to_vec(annotations)?)
            .await?;
        if !bundle.contains(THUMB_MEMBER)? {
            let thumb = self.fetch_thumbnail(parent, video).await?;
            bundle.write_member(THUMB_MEMBER.to_string(), thumb).await?;
        }

        let server_base = self.config.server_base();
        let mut pending = Vec::new();
        for (index, annotation) in Annotations::from_value(annotations)?
            .annotations
            .into_iter()
            .enumerate()
        {
            let Some(attachment) = annotation.attachment else {
                continue;
            };
            let Some(url) = attachment.url else {
                continue;
            };
            let member = attachment_member_name(index, &attachment.filename);
            if !bundle.contains(&member)? {
                pending.push((member, format!("{server_base}{url}")));
            }
        }

        let outcomes: Vec<Result<AttachmentOutcome>> = stream::iter(pending)
            .map(|(member, url)| {
                let bundle = &bundle;
                async move { self.store_attachment(bundle, member, url).await }
            })
            .buffer_unordered(self.config.crawl.attachment_concurrency)
            .collect()
            .await;

        let mut failed = 0u64;
        for outcome in outcomes {
            match outcome? {
                AttachmentOutcome::Written => stats.attachments_written += 1,
                AttachmentOutcome::Forbidden => stats.attachments_skipped += 1,
                AttachmentOutcome::Failed => {
                    stats.attachments_skipped += 1;
                    failed += 1;
                }
            }
        }

        bundle.close().await?;

        if failed == 0 {
            self.completions.mark_complete(path).await?;
        } else {
            tracing::warn!(
                path = %path.display(),
                failed,
                "Bundle left incomplete, missing attachments are retried on the next run"
            );
        }
        Ok(())
    }

    /// Full-size thumbnail of `video`
    ///
    /// An expired link (HTTP 410) refreshes the listing of `parent`, since the
    /// link was derived from it, and fails the item with [`Error::StaleResource`].
    async fn fetch_thumbnail(&self, parent: &NodeId, video: &VideoEntry) -> Result<Vec<u8>> {
        let url = video.thumbnail_url(self.config.server_base());
        match self.fetch_bytes(&url, &self.config.attachment_retry).await {
            Ok(bytes) => Ok(bytes),
            Err(failure) if matches!(failure.error, ApiError::Gone { .. }) => {
                tracing::warn!(
                    oid = %video.oid,
                    url = %url,
                    parent = %parent,
                    "Thumbnail link gone, refreshing parent listing"
                );
                self.listing(parent, true).await?;
                Err(Error::StaleResource {
                    oid: video.oid.clone(),
                    url,
                    parent: parent.to_string(),
                })
            }
            Err(failure) => Err(super::engine::terminal_failure(&url, failure).into()),
        }
    }

    async fn store_attachment(
        &self,
        bundle: &Bundle,
        member: String,
        url: String,
    ) -> Result<AttachmentOutcome> {
        match self.fetch_attachment(&url).await {
            Ok(bytes) => {
                bundle.write_member(member, bytes).await?;
                Ok(AttachmentOutcome::Written)
            }
            Err(failure) if matches!(failure.error, ApiError::Forbidden { .. }) => {
                tracing::info!(member = %member, url = %url, "Attachment forbidden, skipping");
                Ok(AttachmentOutcome::Forbidden)
            }
            Err(failure) => {
                tracing::warn!(
                    member = %member,
                    url = %url,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Attachment download failed, skipping"
                );
                Ok(AttachmentOutcome::Failed)
            }
        }
    }
}

/// Open bundle shared by the attachment tasks of one item
///
/// Fetches run concurrently; member writes go through the mutex one at a time
/// on the blocking pool.
pub(crate) struct Bundle {
    path: PathBuf,
    archive: Arc<Mutex<BundleArchive>>,
}

impl Bundle {
    /// Open `path` for appending, creating it if absent
    pub(crate) async fn open(path: &Path) -> Result<Self> {
        let owned = path.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || BundleArchive::open(&owned))
            .await
            .map_err(|e| Error::Other(format!("bundle task panicked: {e}")))??;
        Ok(Self {
            path: path.to_path_buf(),
            archive: Arc::new(Mutex::new(archive)),
        })
    }

    /// Whether a member with this name is already stored
    pub(crate) fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.members.contains(name))
    }

    /// Names of the stored members
    #[cfg(test)]
    pub(crate) fn members(&self) -> Result<HashSet<String>> {
        Ok(self.lock()?.members.clone())
    }

    /// Store `bytes` under `name` unless present; returns whether it was written
    pub(crate) async fn write_member(&self, name: String, bytes: Vec<u8>) -> Result<bool> {
        let archive = Arc::clone(&self.archive);
        tokio::task::spawn_blocking(move || {
            let mut archive = archive
                .lock()
                .map_err(|_| Error::Other("bundle lock poisoned".into()))?;
            archive.write(&name, &bytes)
        })
        .await
        .map_err(|e| Error::Other(format!("bundle task panicked: {e}")))?
    }

    /// Flush and close the archive
    pub(crate) async fn close(self) -> Result<()> {
        let Bundle { path, archive } = self;
        tokio::task::spawn_blocking(move || {
            let mut archive = archive
                .lock()
                .map_err(|_| Error::Other("bundle lock poisoned".into()))?;
            archive.writer.finish()?;
            Ok::<_, Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("bundle task panicked: {e}")))??;
        tracing::trace!(path = %path.display(), "Bundle closed");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BundleArchive>> {
        self.archive
            .lock()
            .map_err(|_| Error::Other("bundle lock poisoned".into()))
    }
}

struct BundleArchive {
    members: HashSet<String>,
    writer: ZipWriter<File>,
}

impl BundleArchive {
    fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            match read_members(path) {
                Ok(members) => {
                    let file = OpenOptions::new().read(true).write(true).open(path)?;
                    let writer = ZipWriter::new_append(file)?;
                    return Ok(Self { members, writer });
                }
                Err(ZipError::Io(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable bundle");
                    std::fs::remove_file(path)?;
                }
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            members: HashSet::new(),
            writer: ZipWriter::new(file),
        })
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<bool> {
        if self.members.contains(name) {
            return Ok(false);
        }

        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer.start_file(name, options)?;
        self.writer.write_all(bytes)?;
        self.commit()?;

        self.members.insert(name.to_string());
        tracing::debug!(member = name, bytes = bytes.len(), "Bundle member written");
        Ok(true)
    }

    /// Rewrite the central directory and reopen for appending
    fn commit(&mut self) -> Result<()> {
        let file = self.writer.finish()?;
        file.sync_all()?;
        self.writer = ZipWriter::new_append(file)?;
        Ok(())
    }
}

fn read_members(path: &Path) -> zip::result::ZipResult<HashSet<String>> {
    let archive = ZipArchive::new(File::open(path)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}
