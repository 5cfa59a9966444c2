//! HTTP artifact store against a mock validator service.

use flowsmith_resilience::RetryPolicy;
use flowsmith_types::FlowsmithError;
use flowsmith_validator::{ArtifactStore, HttpArtifactStore, StoreError, SubmissionOutcome};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> HttpArtifactStore {
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    HttpArtifactStore::new(&server.uri(), Some("secret-token".into()), Duration::from_secs(5), retry).unwrap()
}

#[tokio::test]
async fn test_list_versions_reads_both_listing_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/support-bot/versions"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versions": [
                {"versionId": "v1", "locked": true},
                {"version": "v2"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifacts/faq-bot/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["v1", "v2", "v3"])))
        .mount(&server)
        .await;

    let store = store(&server);
    let versions = store.list_versions("support-bot").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert!(versions[0].locked);
    assert_eq!(versions[1].tag, "v2");
    assert!(!versions[1].locked);

    let bare = store.list_versions("faq-bot").await.unwrap();
    assert_eq!(bare.len(), 3);
    assert_eq!(bare[2].artifact_id, "faq-bot");
}

#[tokio::test]
async fn test_missing_artifact_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/ghost/versions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifacts/ghost/versions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(matches!(
        store.list_versions("ghost").await,
        Err(StoreError::ArtifactMissing(_))
    ));
    assert!(matches!(
        store.create_version("ghost", "v1").await,
        Err(StoreError::ArtifactMissing(_))
    ));
}

#[tokio::test]
async fn test_listing_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/support-bot/versions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifacts/support-bot/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["v1"])))
        .mount(&server)
        .await;

    let versions = store(&server).list_versions("support-bot").await.unwrap();
    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn test_submit_classifies_locks_and_content_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v2/submissions"))
        .and(body_json(json!({"document": "doc"})))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"errors": [{"category": "state", "message": "version v2 is locked"}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v3/submissions"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!([
            [105, [["routing", "Next Nodes", "unknown target 999"]]],
            [210, [["schema", "Node Type", "expected D or A"]]]
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v4/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.submit("support-bot", "v2", "doc").await.unwrap().is_locked());
    match store.submit("support-bot", "v3", "doc").await.unwrap() {
        SubmissionOutcome::ContentErrors { errors } => assert_eq!(errors.len(), 2),
        other => panic!("expected content errors, got {:?}", other),
    }
    assert!(store.submit("support-bot", "v4", "doc").await.unwrap().is_accepted());
}

#[tokio::test]
async fn test_submit_surfaces_rate_limit_with_wait() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v1/submissions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server).submit("support-bot", "v1", "doc").await.unwrap_err();
    match FlowsmithError::from(err) {
        FlowsmithError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 17),
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_artifact_tolerates_existing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/artifacts"))
        .and(body_json(json!({"artifactId": "support-bot"})))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    store(&server).create_artifact("support-bot").await.unwrap();
}

#[tokio::test]
async fn test_deploy_returns_preview_locator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v3/deployments"))
        .and(body_json(json!({"environment": "staging"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"previewUrl": "https://preview.example/support-bot"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifacts/support-bot/versions/v4/deployments"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let store = store(&server);
    let preview = store.deploy("support-bot", "v3", "staging").await.unwrap();
    assert_eq!(preview.as_deref(), Some("https://preview.example/support-bot"));

    let denied = store.deploy("support-bot", "v4", "staging").await.unwrap_err();
    assert!(matches!(FlowsmithError::from(denied), FlowsmithError::Auth(_)));
}

#[tokio::test]
async fn test_artifact_ids_are_sent_as_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/team%2Fsupport%3Fbot/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["v1"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/artifacts/team%2Fsupport%3Fbot/versions/v1/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    let versions = store.list_versions("team/support?bot").await.unwrap();
    assert_eq!(versions[0].artifact_id, "team/support?bot");
    assert!(store.submit("team/support?bot", "v1", "doc").await.unwrap().is_accepted());
}

#[test]
fn test_unusable_base_url_is_a_config_error() {
    let result = HttpArtifactStore::new(
        "validator.internal",
        None,
        Duration::from_secs(1),
        RetryPolicy::default(),
    );
    assert!(matches!(result, Err(StoreError::Remote(FlowsmithError::Config(_)))));
}
