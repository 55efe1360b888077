//! Depth-first walk of the remote channel tree

use super::Mirror;
use crate::error::{Error, Result};
use crate::sanitize::sanitize;
use crate::types::{ChannelListing, MirrorStats, NodeId, VideoEntry};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File name of the per-directory listing snapshot
pub(crate) const SNAPSHOT_FILE: &str = "data.json";

impl Mirror {
    /// Mirror the whole tree into the output directory
    ///
    /// Channels are visited depth-first in pre-order, siblings in the order the
    /// server lists them. For each channel the directory is created, the listing
    /// snapshot written, every ready item mirrored (bundle, then primary media),
    /// and then each child channel is descended into.
    ///
    /// # Errors
    ///
    /// A listing that does not report success, or a primary download that
    /// exhausts its retries, aborts the run. An expired thumbnail link only
    /// skips its item.
    pub async fn run(&self) -> Result<MirrorStats> {
        let mut stats = MirrorStats::default();
        let mut pending = vec![(NodeId::Root, self.config.output_dir.clone())];

        while let Some((node, dir)) = pending.pop() {
            let (raw, listing) = self.list_node(&node).await?;

            ensure_dir(&dir).await?;
            stats.channels_visited += 1;
            tracing::info!(oid = %node, path = %dir.display(), "WIP");

            self.write_snapshot(&dir, &raw).await?;

            for video in &listing.videos {
                stats.items_seen += 1;
                if !video.ready {
                    tracing::info!(oid = %video.oid, title = %video.title, "Item isn't ready, skipping");
                    stats.items_not_ready += 1;
                    continue;
                }

                match self.mirror_item(&node, &dir, video, &mut stats).await {
                    Ok(()) => {}
                    Err(Error::StaleResource { oid, url, parent }) => {
                        tracing::warn!(
                            oid = %oid,
                            title = %video.title,
                            url = %url,
                            parent = %parent,
                            "Resource link expired, item skipped until next run"
                        );
                        stats.items_stale += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            pending.extend(self.child_channels(&listing, &dir).into_iter().rev());
        }

        tracing::info!(%stats, "Mirror run finished");
        Ok(stats)
    }

    /// Walk the tree without touching the output directory
    ///
    /// Returns every item (ready or not) paired with the local directory it
    /// would be mirrored into, in traversal order.
    pub async fn enumerate(&self) -> Result<Vec<(PathBuf, VideoEntry)>> {
        let mut items = Vec::new();
        let mut pending = vec![(NodeId::Root, self.config.output_dir.clone())];

        while let Some((node, dir)) = pending.pop() {
            let (_, listing) = self.list_node(&node).await?;
            let children = self.child_channels(&listing, &dir);
            items.extend(listing.videos.into_iter().map(|video| (dir.clone(), video)));
            pending.extend(children.into_iter().rev());
        }

        Ok(items)
    }

    async fn list_node(&self, node: &NodeId) -> Result<(Value, ChannelListing)> {
        let raw = self.listing(node, false).await?;
        let listing = ChannelListing::from_value(&raw)?;
        if !listing.success {
            tracing::error!(oid = %node, "Listing did not report success");
            return Err(Error::ListingFailed {
                oid: node.to_string(),
            });
        }
        Ok((raw, listing))
    }

    /// Child channels to descend into, in server order
    fn child_channels(&self, listing: &ChannelListing, dir: &Path) -> Vec<(NodeId, PathBuf)> {
        listing
            .channels
            .iter()
            .filter(|channel| {
                let skip = channel.slug == self.config.crawl.recycle_bin_slug;
                if skip {
                    tracing::debug!(oid = %channel.oid, title = %channel.title, "Skipping recycle bin");
                }
                !skip
            })
            .map(|channel| {
                (
                    NodeId::Channel(channel.oid.clone()),
                    dir.join(sanitize(&channel.title)),
                )
            })
            .collect()
    }

    async fn write_snapshot(&self, dir: &Path, raw: &Value) -> Result<()> {
        let path = dir.join(SNAPSHOT_FILE);
        if self.config.cache.reuse_snapshots && tokio::fs::try_exists(&path).await? {
            tracing::trace!(path = %path.display(), "Keeping existing snapshot");
            return Ok(());
        }
        tokio::fs::write(&path, serde_json::to_vec(raw)?).await?;
        Ok(())
    }

    /// Bundle then primary media for one ready item
    async fn mirror_item(
        &self,
        parent: &NodeId,
        dir: &Path,
        video: &VideoEntry,
        stats: &mut MirrorStats,
    ) -> Result<()> {
        let modes = self.cached(&self.endpoints.media_modes(&video.oid), false).await?;
        let annotations = self.cached(&self.endpoints.annotations(&video.oid), false).await?;

        let bundle_path = dir.join(sanitize(&format!("{}.zip", video.title)));
        self.ensure_bundle(parent, video, &bundle_path, &modes, &annotations, stats)
            .await?;

        self.mirror_primary(dir, video, &modes, stats).await
    }
}

/// Create `dir` unless it already exists as a directory
async fn ensure_dir(dir: &Path) -> Result<()> {
    match tokio::fs::create_dir(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            if tokio::fs::metadata(dir).await?.is_dir() {
                Ok(())
            } else {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("'{}' exists and is not a directory", dir.display()),
                )))
            }
        }
        Err(e) => Err(Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory '{}': {}", dir.display(), e),
        ))),
    }
}
