//! Request keys for the API endpoints the mirror calls
//!
//! A request key is the endpoint path plus its query string. It is what the
//! [`ApiClient`](crate::client::ApiClient) receives and what the response cache
//! is keyed by, so it must be a pure function of its inputs.

use crate::types::NodeId;
use url::form_urlencoded::Serializer;

/// Builder for request keys
#[derive(Clone, Debug)]
pub struct Endpoints {
    cache_buster: Option<String>,
    html5_formats: String,
}

impl Endpoints {
    /// Create a builder; `cache_buster` is appended as `_=<token>` when set
    pub fn new(cache_buster: Option<String>, html5_formats: impl Into<String>) -> Self {
        Self {
            cache_buster: cache_buster.filter(|t| !t.trim().is_empty()),
            html5_formats: html5_formats.into(),
        }
    }

    /// Listing of a node's child channels and videos
    pub fn listing(&self, node: &NodeId) -> String {
        match node {
            NodeId::Root => format!("channels/content/?{}", Self::query(&[("local", "yes")])),
            NodeId::Channel(oid) => format!(
                "channels/content/?{}",
                self.busted(&[
                    ("parent_oid", oid.as_str()),
                    ("content", "cvlp"),
                    ("order_by", "default"),
                    ("local", "yes"),
                ])
            ),
        }
    }

    /// Encoding modes of a video
    pub fn media_modes(&self, oid: &str) -> String {
        format!(
            "medias/modes/?{}",
            self.busted(&[
                ("oid", oid),
                ("html5", self.html5_formats.as_str()),
                ("yt", "yt"),
                ("embed", "embed"),
            ])
        )
    }

    /// Annotations (and their attachments) of a video
    pub fn annotations(&self, oid: &str) -> String {
        format!(
            "annotations/list/?{}",
            self.busted(&[("oid", oid), ("local", "yes")])
        )
    }

    fn busted(&self, pairs: &[(&str, &str)]) -> String {
        match &self.cache_buster {
            Some(token) => {
                let mut all: Vec<(&str, &str)> = pairs.to_vec();
                all.push(("_", token.as_str()));
                Self::query(&all)
            }
            None => Self::query(pairs),
        }
    }

    fn query(pairs: &[(&str, &str)]) -> String {
        let mut serializer = Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(None, crate::config::CrawlConfig::default().html5_formats)
    }
}
