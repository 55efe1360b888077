//! Mock media server fixtures

use mediaserver_mirror::Config;
use mediaserver_mirror::config::RetryConfig;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LISTING_PATH: &str = "/api/v2/channels/content/";
pub const MODES_PATH: &str = "/api/v2/medias/modes/";
pub const ANNOTATIONS_PATH: &str = "/api/v2/annotations/list/";

/// Thumbnail bytes served for every item
pub const THUMB_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 fake jpeg";

/// Configuration mirroring into `<temp>/mirror`, caches under `<temp>/state`
pub fn mirror_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let output_dir = temp_dir.path().join("mirror");
    let state_dir = temp_dir.path().join("state");
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::create_dir_all(&state_dir).unwrap();

    let fast = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 1.0,
        jitter: false,
    };

    let mut config = Config::new(output_dir, "integration-key");
    config.server_url = server.uri();
    config.cache.response_cache_path = Some(state_dir.join("responses.db"));
    config.cache.completion_cache_path = Some(state_dir.join("completions.db"));
    config.primary_retry = fast.clone();
    config.attachment_retry = fast;
    config
}

pub fn listing(channels: Value, videos: Value) -> Value {
    json!({"success": true, "channels": channels, "videos": videos})
}

pub fn channel(oid: &str, title: &str, slug: &str) -> Value {
    json!({"oid": oid, "title": title, "slug": slug})
}

pub fn video(oid: &str, title: &str, ready: bool) -> Value {
    json!({
        "oid": oid,
        "title": title,
        "ready": ready,
        "thumb": format!("/thumbs/{oid}/thumb_catalog.jpg")
    })
}

pub async fn mount_listing(server: &MockServer, parent: Option<&str>, body: Value) {
    let mock = Mock::given(method("GET")).and(path(LISTING_PATH));
    let mock = match parent {
        Some(oid) => mock.and(query_param("parent_oid", oid)),
        None => mock.and(query_param_is_missing("parent_oid")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Modes, annotations and thumbnail of one item; the media itself is mounted separately
pub async fn mount_item_metadata(server: &MockServer, oid: &str, attachments: &[(&str, &str)]) {
    let modes = json!({
        "success": true,
        "names": ["audio_only", "mp4_720"],
        "audio_only": {"resource": {"url": format!("{}/stream/{oid}", server.uri())}},
        "mp4_720": {"resource": {"format": "mp4", "url": format!("{}/media/{oid}.mp4", server.uri())}}
    });
    let annotations: Vec<Value> = attachments
        .iter()
        .map(|(filename, url)| json!({"attachment": {"filename": filename, "url": url}}))
        .collect();

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .and(query_param("oid", oid))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(ANNOTATIONS_PATH))
        .and(query_param("oid", oid))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "annotations": annotations})),
        )
        .mount(server)
        .await;
    mount_file(server, &format!("/thumbs/{oid}/thumb.jpg"), 200, THUMB_BYTES).await;
}

pub async fn mount_file(server: &MockServer, at: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Root, then "Math", then ready "Lecture1" with an mp4 mode and one attachment
pub async fn mount_math_tree(server: &MockServer) {
    mount_listing(server, None, listing(json!([channel("c_math", "Math", "math")]), json!([]))).await;
    mount_listing(
        server,
        Some("c_math"),
        listing(json!([]), json!([video("v_l1", "Lecture1", true)])),
    )
    .await;
    mount_item_metadata(server, "v_l1", &[("slides.pdf", "/attachments/v_l1/slides.pdf")]).await;
    mount_file(server, "/attachments/v_l1/slides.pdf", 200, b"%PDF-1.4 slides").await;
    mount_file(server, "/media/v_l1.mp4", 200, &[0x42u8; 64 * 1024]).await;
}
