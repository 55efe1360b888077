//! End-to-end runs against a mock media server
//!
//! Each test mounts a small channel tree on a wiremock server, runs the full
//! mirror into a temp directory and checks the produced tree.

mod common;

use common::*;
use mediaserver_mirror::{DownloadError, Error, Mirror};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn math_lecture_tree_is_mirrored() {
    let server = MockServer::start().await;
    mount_math_tree(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = mirror_config(&server, &temp_dir);
    let out = config.output_dir.clone();

    let stats = Mirror::new(config).await.unwrap().run().await.unwrap();

    assert_eq!(
        tree(&out),
        set(&[
            "data.json",
            "Math",
            "Math/data.json",
            "Math/Lecture1.mp4",
            "Math/Lecture1.zip"
        ])
    );
    assert_eq!(
        zip_members(&out.join("Math/Lecture1.zip")),
        set(&["medias.json", "annotations.json", "thumb.jpg", "000001_slides.pdf"])
    );
    assert_eq!(std::fs::read(out.join("Math/Lecture1.mp4")).unwrap().len(), 64 * 1024);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out.join("Math/data.json")).unwrap()).unwrap();
    assert_eq!(snapshot["videos"][0]["oid"], "v_l1");

    assert_eq!(stats.channels_visited, 2);
    assert_eq!(stats.primaries_downloaded, 1);
    assert_eq!(stats.attachments_written, 1);
}

#[tokio::test]
async fn second_run_issues_no_requests_and_changes_nothing() {
    let server = MockServer::start().await;
    mount_math_tree(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = mirror_config(&server, &temp_dir);
    let out = config.output_dir.clone();

    Mirror::new(config.clone()).await.unwrap().run().await.unwrap();
    let requests_after_first = server.received_requests().await.unwrap().len();
    let contents_after_first = file_contents(&out);

    let stats = Mirror::new(config).await.unwrap().run().await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), requests_after_first);
    assert_eq!(file_contents(&out), contents_after_first);
    assert_eq!(stats.bundles_complete, 1);
    assert_eq!(stats.primaries_present, 1);
}

#[tokio::test]
async fn paths_are_sanitized_and_stable() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        None,
        listing(json!([channel("c1", "Physics: 101/Intro?", "physics")]), json!([])),
    )
    .await;
    mount_listing(
        &server,
        Some("c1"),
        listing(json!([]), json!([video("v1", "Waves <part 1>", true)])),
    )
    .await;
    mount_item_metadata(&server, "v1", &[("a|b.pdf", "/att/ab.pdf")]).await;
    mount_file(&server, "/att/ab.pdf", 200, b"pdf").await;
    mount_file(&server, "/media/v1.mp4", 200, b"mp4").await;

    let temp_dir = TempDir::new().unwrap();
    let config = mirror_config(&server, &temp_dir);
    let out = config.output_dir.clone();

    let mirror = Mirror::new(config).await.unwrap();
    mirror.run().await.unwrap();
    let first = tree(&out);
    mirror.run().await.unwrap();

    assert!(first.contains("Physics  101 Intro/Waves  part 1 .mp4"), "{first:?}");
    assert!(first.contains("Physics  101 Intro/Waves  part 1 .zip"), "{first:?}");
    assert_eq!(tree(&out), first);
    assert!(
        zip_members(&out.join("Physics  101 Intro/Waves  part 1 .zip")).contains("000001_a b.pdf")
    );
}

#[tokio::test]
async fn failing_primary_aborts_run_without_leaving_a_file() {
    let server = MockServer::start().await;
    mount_listing(&server, None, listing(json!([]), json!([video("v1", "Broken", true)]))).await;
    mount_item_metadata(&server, "v1", &[]).await;
    Mock::given(method("GET"))
        .and(path("/media/v1.mp4"))
        .respond_with(ResponseTemplate::new(500))
        // Initial attempt plus two retries
        .expect(3)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = mirror_config(&server, &temp_dir);
    let out = config.output_dir.clone();

    let err = Mirror::new(config).await.unwrap().run().await.unwrap_err();

    assert!(
        matches!(err, Error::Download(DownloadError::RetriesExhausted { attempts: 3, .. })),
        "{err:?}"
    );
    let produced = tree(&out);
    assert!(!produced.contains("Broken.mp4"));
    assert!(!produced.iter().any(|p| p.ends_with(".part")));
    assert!(produced.contains("Broken.zip"), "bundle is built before the primary");
}

#[tokio::test]
async fn cache_buster_token_is_sent() {
    let server = MockServer::start().await;
    mount_listing(&server, None, listing(json!([channel("c1", "Math", "math")]), json!([]))).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("parent_oid", "c1"))
        .and(query_param("_", "1676042876656"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([]), json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = mirror_config(&server, &temp_dir);
    config.cache.cache_buster = Some("1676042876656".into());

    Mirror::new(config).await.unwrap().run().await.unwrap();
}

#[tokio::test]
async fn recycle_bin_subtree_never_appears() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        None,
        listing(
            json!([channel("c_trash", "Trash", "recycle-bin"), channel("c_math", "Math", "math")]),
            json!([]),
        ),
    )
    .await;
    mount_listing(&server, Some("c_math"), listing(json!([]), json!([]))).await;

    let temp_dir = TempDir::new().unwrap();
    let config = mirror_config(&server, &temp_dir);
    let out = config.output_dir.clone();
    Mirror::new(config).await.unwrap().run().await.unwrap();

    assert_eq!(tree(&out), set(&["data.json", "Math", "Math/data.json"]));
}
