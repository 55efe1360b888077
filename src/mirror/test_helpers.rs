//! Shared test helpers for creating Mirror instances against a mock media server.

use crate::config::{Config, RetryConfig};
use crate::mirror::Mirror;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const API_KEY: &str = "test-key";
pub(crate) const LISTING_PATH: &str = "/api/v2/channels/content/";
pub(crate) const MODES_PATH: &str = "/api/v2/medias/modes/";
pub(crate) const ANNOTATIONS_PATH: &str = "/api/v2/annotations/list/";

/// Retry policy with millisecond delays
pub(crate) fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 1.0,
        jitter: false,
    }
}

/// Configuration pointing at `server`, mirroring into `<temp>/mirror`
///
/// Cache stores live in `<temp>/state` so the output tree only holds mirrored content.
pub(crate) fn test_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let output_dir = temp_dir.path().join("mirror");
    let state_dir = temp_dir.path().join("state");
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::create_dir_all(&state_dir).unwrap();

    let mut config = Config::new(output_dir, API_KEY);
    config.server_url = server.uri();
    config.cache.response_cache_path = Some(state_dir.join("responses.db"));
    config.cache.completion_cache_path = Some(state_dir.join("completions.db"));
    config.timeouts.listing = Duration::from_secs(5);
    config.timeouts.transfer = Duration::from_secs(5);
    config.primary_retry = fast_retry(2);
    config.attachment_retry = fast_retry(1);
    config
}

/// Helper to create a test Mirror; the tempdir must be kept alive.
pub(crate) async fn create_test_mirror(server: &MockServer) -> (Mirror, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(server, &temp_dir);
    let mirror = Mirror::new(config).await.unwrap();
    (mirror, temp_dir)
}

pub(crate) fn output_dir(mirror: &Mirror) -> PathBuf {
    mirror.config().output_dir.clone()
}

pub(crate) fn listing(channels: Value, videos: Value) -> Value {
    json!({"success": true, "channels": channels, "videos": videos})
}

pub(crate) fn channel(oid: &str, title: &str, slug: &str) -> Value {
    json!({"oid": oid, "title": title, "slug": slug})
}

pub(crate) fn video(oid: &str, title: &str, ready: bool) -> Value {
    json!({
        "oid": oid,
        "title": title,
        "ready": ready,
        "thumb": format!("/thumbs/{oid}/thumb_catalog.jpg")
    })
}

pub(crate) fn mp4_modes(server: &MockServer, oid: &str) -> Value {
    json!({
        "success": true,
        "names": ["embed", "mp4_hd"],
        "embed": {"resource": {"url": "https://embed.example.com/x"}},
        "mp4_hd": {"resource": {"format": "mp4", "url": format!("{}/media/{oid}.mp4", server.uri())}}
    })
}

pub(crate) fn annotations(attachments: &[(&str, &str)]) -> Value {
    let items: Vec<Value> = attachments
        .iter()
        .map(|(filename, url)| json!({"attachment": {"filename": filename, "url": url}}))
        .collect();
    json!({"success": true, "annotations": items})
}

pub(crate) async fn mount_root(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param_is_missing("parent_oid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub(crate) async fn mount_channel(server: &MockServer, oid: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("parent_oid", oid))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub(crate) async fn mount_modes(server: &MockServer, oid: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .and(query_param("oid", oid))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub(crate) async fn mount_annotations(server: &MockServer, oid: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(ANNOTATIONS_PATH))
        .and(query_param("oid", oid))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub(crate) async fn mount_bytes(server: &MockServer, at: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Everything one ready item needs: modes, no annotations, thumbnail and media
pub(crate) async fn mount_item(server: &MockServer, oid: &str) {
    mount_modes(server, oid, mp4_modes(server, oid)).await;
    mount_annotations(server, oid, annotations(&[])).await;
    mount_bytes(server, &format!("/thumbs/{oid}/thumb.jpg"), 200, b"jpeg").await;
    mount_bytes(server, &format!("/media/{oid}.mp4"), 200, b"video bytes").await;
}
