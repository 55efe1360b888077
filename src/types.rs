//! Views over the remote payloads and the run summary
//!
//! Only the fields the mirror reads are modelled; everything else in a payload
//! is kept verbatim in the raw JSON that gets snapshotted or bundled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Identity of a node in the remote tree
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// The synthetic root of the catalog
    Root,
    /// A channel identified by its oid
    Channel(String),
}

impl NodeId {
    /// Identifier used in log lines and error messages
    pub fn as_str(&self) -> &str {
        match self {
            NodeId::Root => "root",
            NodeId::Channel(oid) => oid,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing of one channel: its child channels and its videos
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChannelListing {
    /// Whether the server reported success
    #[serde(default)]
    pub success: bool,
    /// Child channels in server order
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
    /// Leaf items in server order
    #[serde(default)]
    pub videos: Vec<VideoEntry>,
}

impl ChannelListing {
    /// Decode the fields the crawler needs from a raw listing
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

/// A child channel inside a listing
#[derive(Clone, Debug, Deserialize)]
pub struct ChannelEntry {
    /// Remote identifier
    pub oid: String,
    /// Display title, used for the local directory name
    pub title: String,
    /// URL slug, compared against the recycle-bin sentinel
    #[serde(default)]
    pub slug: String,
}

/// A video (leaf item) inside a listing
#[derive(Clone, Debug, Deserialize)]
pub struct VideoEntry {
    /// Remote identifier
    pub oid: String,
    /// Display title, used for the local file names
    pub title: String,
    /// Not-ready items are skipped until a later run
    #[serde(default)]
    pub ready: bool,
    /// Server-relative thumbnail path
    #[serde(default)]
    pub thumb: String,
}

impl VideoEntry {
    /// Absolute URL of the full-size thumbnail
    pub fn thumbnail_url(&self, server_base: &str) -> String {
        format!(
            "{}{}",
            server_base,
            self.thumb.replace("thumb_catalog.jpg", "thumb.jpg")
        )
    }
}

/// Encoding modes offered for one video
///
/// The payload lists mode names under `names` and describes each mode under a
/// top-level key of the same name.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MediaModes {
    /// Mode names in server order
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(flatten)]
    entries: HashMap<String, Value>,
}

impl MediaModes {
    /// Decode a raw media modes payload
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// Downloadable resource of the named mode, if any
    pub fn resource(&self, name: &str) -> Option<MediaResource> {
        let resource = self.entries.get(name)?.get("resource")?;
        MediaResource::deserialize(resource).ok()
    }
}

/// The file behind one encoding mode
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct MediaResource {
    /// File extension, absent for streams that cannot be saved as a file
    #[serde(default)]
    pub format: Option<String>,
    /// Download URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Annotations attached to one video
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Annotations {
    /// Annotations in server order
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Annotations {
    /// Decode a raw annotations payload
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

/// One annotation; only those carrying an attachment matter here
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Annotation {
    /// Attached file (slide, document)
    #[serde(default)]
    pub attachment: Option<AttachmentRef>,
}

/// Reference to an attachment file
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AttachmentRef {
    /// Original file name
    #[serde(default)]
    pub filename: String,
    /// Server-relative URL; attachments without one are not downloadable
    #[serde(default)]
    pub url: Option<String>,
}

/// Counters accumulated over one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    /// Channels whose directory was visited (root included)
    pub channels_visited: u64,
    /// Videos seen in listings
    pub items_seen: u64,
    /// Videos skipped because they were not ready
    pub items_not_ready: u64,
    /// Videos skipped because a resource link had expired
    pub items_stale: u64,
    /// Primary files downloaded in this run
    pub primaries_downloaded: u64,
    /// Primary files already on disk
    pub primaries_present: u64,
    /// Videos with no downloadable mode
    pub primaries_unavailable: u64,
    /// Bundles written (fully or partially) in this run
    pub bundles_built: u64,
    /// Bundles already marked complete
    pub bundles_complete: u64,
    /// Attachment members written in this run
    pub attachments_written: u64,
    /// Attachments skipped (forbidden or failing)
    pub attachments_skipped: u64,
}

impl fmt::Display for MirrorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channel(s), {} item(s) [{} not ready, {} stale], primaries {} new / {} present / {} unavailable, bundles {} built / {} complete, attachments {} written / {} skipped",
            self.channels_visited,
            self.items_seen,
            self.items_not_ready,
            self.items_stale,
            self.primaries_downloaded,
            self.primaries_present,
            self.primaries_unavailable,
            self.bundles_built,
            self.bundles_complete,
            self.attachments_written,
            self.attachments_skipped,
        )
    }
}
