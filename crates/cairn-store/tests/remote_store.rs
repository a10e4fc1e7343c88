//! Contract tests for the RemoteStore HTTP client.
//!
//! The client is blocking, so each call runs on the blocking pool while
//! wiremock serves from the async runtime.

use cairn_core::{CairnError, Fingerprint, RemoteConfig};
use cairn_store::{Backend, RemoteStore};
use wiremock::matchers::{body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> RemoteConfig {
    let mut config = RemoteConfig::new(
        format!("{}/blocks", server.uri()),
        format!("{}/upload", server.uri()),
        "test-secret",
    );
    config.timeout_secs = 5;
    config
}

/// Run `f` against a fresh client on the blocking pool.
async fn with_client<T: Send + 'static>(
    config: RemoteConfig,
    f: impl FnOnce(&RemoteStore) -> T + Send + 'static,
) -> T {
    tokio::task::spawn_blocking(move || {
        let store = RemoteStore::new(&config).unwrap();
        f(&store)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn get_returns_body_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/blocks/sha-256%3A"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8; 32], "application/octet-stream"))
        .mount(&server)
        .await;

    let bytes = with_client(config(&server), |s| s.get("sha-256:abc").map(|b| b.to_vec()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![7u8; 32]);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_maps_410_to_no_such_block() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.get("sha-256:gone").map(|b| b.to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::NoSuchBlock { ref name } if name == "sha-256:gone"));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_maps_other_status_to_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.get("sha-256:x").map(|b| b.to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { .. }));
    assert!(err.is_io());
}

#[tokio::test(flavor = "multi_thread")]
async fn get_rejects_wrong_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.get("sha-256:x").map(|b| b.to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn get_rejects_missing_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.get("sha-256:bare").map(|b| b.to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { ref reason, .. } if reason.contains("none")));
}

#[tokio::test(flavor = "multi_thread")]
async fn put_sends_multipart_and_accepts_echo() {
    let server = MockServer::start().await;
    let name = Fingerprint::of(Default::default(), b"payload").encode();
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("AUTHENTICATOR"))
        .and(body_string_contains("test-secret"))
        .and(body_string_contains("EXPECTED_NAME"))
        .and(body_string_contains(name.as_str()))
        .and(body_string_contains("FILE_CONTENTS"))
        .and(body_string_contains("DIGEST_ALGORITHM"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{name}\n")))
        .expect(1)
        .mount(&server)
        .await;

    let sent = name.clone();
    with_client(config(&server), move |s| s.put(&sent, b"payload"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn put_rejects_name_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sha-256:somethingelse\n"))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.put("sha-256:mine", b"bytes"))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { ref reason, .. } if reason.contains("somethingelse")));
}

#[tokio::test(flavor = "multi_thread")]
async fn put_maps_rejection_to_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad authenticator"))
        .mount(&server)
        .await;

    let err = with_client(config(&server), |s| s.put("sha-256:mine", b"bytes"))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { ref reason, .. } if reason.contains("403")));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_network_error() {
    let config = RemoteConfig::new("http://127.0.0.1:1/blocks", "http://127.0.0.1:1/upload", "s");
    let err = with_client(config, |s| s.get("sha-256:x").map(|b| b.to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::Network { .. }));
}
