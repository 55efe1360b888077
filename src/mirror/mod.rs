//! Mirror engine split into focused submodules.
//!
//! The [`Mirror`] struct and its methods are organized by domain:
//! - [`crawler`] - Depth-first walk of the channel tree, directories and snapshots
//! - [`bundle`] - Per-item archive of metadata, thumbnail and attachments
//! - [`engine`] - Primary media selection and transfers with bounded retry

mod bundle;
mod crawler;
mod engine;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use bundle::{ANNOTATIONS_MEMBER, MEDIAS_MEMBER, THUMB_MEMBER, attachment_member_name};
pub use engine::{PrimarySelection, select_primary};

use crate::cache::{CompletionCache, ResponseCache};
use crate::client::{ApiClient, MediaServerClient};
use crate::config::Config;
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};
use crate::types::NodeId;
use serde_json::Value;
use std::sync::Arc;

/// Main mirror instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Mirror {
    /// Remote API capability
    pub(crate) client: Arc<dyn ApiClient>,
    /// Cached API responses, shared by every listing lookup
    pub(crate) responses: Arc<ResponseCache>,
    /// Bundle completion markers
    pub(crate) completions: Arc<CompletionCache>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Request key builder
    pub(crate) endpoints: Endpoints,
}

impl Mirror {
    /// Create a mirror talking to the configured media server
    ///
    /// Validates the configuration, then opens (or creates) both cache stores.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = MediaServerClient::new(&config.server_url, &config.client_id, &config.api_key)?;
        Self::with_client(config, Arc::new(client)).await
    }

    /// Create a mirror around an existing [`ApiClient`]
    pub async fn with_client(config: Config, client: Arc<dyn ApiClient>) -> Result<Self> {
        let responses =
            ResponseCache::open(&config.response_cache_path(), config.cache.force_reload).await?;
        let completions = CompletionCache::open(&config.completion_cache_path()).await?;
        let endpoints = Endpoints::new(
            config.cache.cache_buster.clone(),
            config.crawl.html5_formats.clone(),
        );

        tracing::info!(
            server = %config.server_url,
            output_dir = %config.output_dir.display(),
            cached_responses = responses.len().await,
            complete_bundles = completions.len().await,
            force_reload = config.cache.force_reload,
            "Mirror initialized"
        );

        Ok(Self {
            client,
            responses: Arc::new(responses),
            completions: Arc::new(completions),
            config: Arc::new(config),
            endpoints,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Response cache in use
    pub fn responses(&self) -> &ResponseCache {
        &self.responses
    }

    /// Completion cache in use
    pub fn completions(&self) -> &CompletionCache {
        &self.completions
    }

    /// Listing of `node`, through the response cache
    pub(crate) async fn listing(&self, node: &NodeId, force_new: bool) -> Result<Value> {
        let key = self.endpoints.listing(node);
        self.cached(&key, force_new).await
    }

    /// Call an API endpoint through the response cache
    pub(crate) async fn cached(&self, key: &str, force_new: bool) -> Result<Value> {
        let client = &self.client;
        let timeout = self.config.timeouts.listing;
        self.responses
            .get_or_fetch(key, force_new, |key| async move {
                client.api(&key, timeout).await.map_err(Error::from)
            })
            .await
    }
}
