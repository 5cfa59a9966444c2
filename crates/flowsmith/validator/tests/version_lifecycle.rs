//! Version probing and artifact creation against scripted and in-memory
//! stores.

use async_trait::async_trait;
use flowsmith_types::{serialize, ArtifactVersion, FlowsmithError, Node, ValidationError};
use flowsmith_validator::{
    ArtifactStore, InMemoryArtifactStore, StoreError, StoreResult, SubmissionOutcome,
    ValidatorClient, VersionManager,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Store whose per-version answers are fixed up front. Versions without a
/// scripted answer accept.
struct ScriptedStore {
    versions: Mutex<Vec<String>>,
    answers: HashMap<String, Result<SubmissionOutcome, FlowsmithError>>,
    artifact_exists: AtomicBool,
    artifact_creation_sticks: bool,
    submitted: Mutex<Vec<String>>,
    version_creates: AtomicU32,
    artifact_creates: AtomicU32,
}

impl ScriptedStore {
    fn new(versions: &[&str]) -> Self {
        Self {
            versions: Mutex::new(versions.iter().map(|tag| tag.to_string()).collect()),
            answers: HashMap::new(),
            artifact_exists: AtomicBool::new(true),
            artifact_creation_sticks: true,
            submitted: Mutex::new(Vec::new()),
            version_creates: AtomicU32::new(0),
            artifact_creates: AtomicU32::new(0),
        }
    }

    fn answer(mut self, tag: &str, answer: Result<SubmissionOutcome, FlowsmithError>) -> Self {
        self.answers.insert(tag.to_string(), answer);
        self
    }

    fn locked(self, tag: &str) -> Self {
        self.answer(
            tag,
            Ok(SubmissionOutcome::VersionLocked {
                message: format!("{} is locked", tag),
            }),
        )
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for ScriptedStore {
    async fn list_versions(&self, artifact_id: &str) -> StoreResult<Vec<ArtifactVersion>> {
        if !self.artifact_exists.load(Ordering::SeqCst) {
            return Err(StoreError::ArtifactMissing(artifact_id.to_string()));
        }
        Ok(self
            .versions
            .lock()
            .unwrap()
            .iter()
            .map(|tag| ArtifactVersion::new(artifact_id, tag.as_str()))
            .collect())
    }

    async fn create_artifact(&self, _artifact_id: &str) -> StoreResult<()> {
        self.artifact_creates.fetch_add(1, Ordering::SeqCst);
        if self.artifact_creation_sticks {
            self.artifact_exists.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn create_version(&self, artifact_id: &str, tag: &str) -> StoreResult<ArtifactVersion> {
        self.version_creates.fetch_add(1, Ordering::SeqCst);
        if !self.artifact_exists.load(Ordering::SeqCst) {
            return Err(StoreError::ArtifactMissing(artifact_id.to_string()));
        }
        self.versions.lock().unwrap().push(tag.to_string());
        Ok(ArtifactVersion::new(artifact_id, tag))
    }

    async fn submit(&self, _artifact_id: &str, tag: &str, _document: &str) -> StoreResult<SubmissionOutcome> {
        self.submitted.lock().unwrap().push(tag.to_string());
        match self.answers.get(tag) {
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(err)) => Err(StoreError::Remote(err.clone())),
            None => Ok(SubmissionOutcome::Accepted),
        }
    }

    async fn deploy(&self, _artifact_id: &str, _tag: &str, _environment: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }
}

fn manager(store: &Arc<ScriptedStore>) -> VersionManager {
    VersionManager::new(Arc::clone(store) as Arc<dyn ArtifactStore>)
}

fn valid_document() -> flowsmith_types::FlowDocument {
    serialize(&[
        Node::decision(1, "Welcome").with_message("Hello").with_next([2]),
        Node::action(2, "Create ticket", "create_ticket").with_next([3]),
        Node::decision(3, "Done").with_message("Ticket created"),
    ])
}

#[tokio::test]
async fn test_checks_newest_first_and_skips_locked_versions() {
    let store = Arc::new(ScriptedStore::new(&["v1", "v10", "v2"]).locked("v10"));

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap();

    assert_eq!(submission.version, "v2");
    assert_eq!(submission.outcome, SubmissionOutcome::Accepted);
    assert_eq!(store.submitted(), vec!["v10", "v2"]);
}

#[tokio::test]
async fn test_last_known_locked_is_not_checked() {
    let store = Arc::new(ScriptedStore::new(&["v1", "v2", "v3"]));

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", Some("v3"))
        .await
        .unwrap();

    assert_eq!(submission.version, "v2");
    assert_eq!(store.submitted(), vec!["v2"]);
}

#[tokio::test]
async fn test_content_errors_stop_probing() {
    let errors = vec![ValidationError::for_node(4, "routing", "Next Nodes", "unknown target")];
    let store = Arc::new(
        ScriptedStore::new(&["v1", "v2", "v3"])
            .answer("v3", Ok(SubmissionOutcome::ContentErrors { errors: errors.clone() })),
    );

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap();

    assert_eq!(submission.version, "v3");
    assert_eq!(submission.outcome, SubmissionOutcome::ContentErrors { errors });
    assert_eq!(store.submitted(), vec!["v3"]);
    assert_eq!(store.version_creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_locked_creates_the_next_version() {
    let store = Arc::new(ScriptedStore::new(&["v1", "v2"]).locked("v1").locked("v2"));

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap();

    assert_eq!(submission.version, "v3");
    assert_eq!(store.submitted(), vec!["v2", "v1", "v3"]);
    assert_eq!(store.version_creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lock_on_the_new_version_surfaces() {
    let store = Arc::new(ScriptedStore::new(&["v1"]).locked("v1").locked("v2"));

    let err = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap_err();

    match err {
        FlowsmithError::VersionLocked { artifact_id, version, .. } => {
            assert_eq!(artifact_id, "support-bot");
            assert_eq!(version, "v2");
        }
        other => panic!("expected a version lock, got {:?}", other),
    }
}

#[tokio::test]
async fn test_auth_failure_aborts_probing() {
    let store = Arc::new(
        ScriptedStore::new(&["v1", "v2"]).answer("v2", Err(FlowsmithError::Auth("token revoked".into()))),
    );

    let err = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowsmithError::Auth(_)));
    assert_eq!(store.submitted(), vec!["v2"]);
}

#[tokio::test]
async fn test_other_failures_move_on_to_the_next_candidate() {
    let store = Arc::new(
        ScriptedStore::new(&["v1", "v2"]).answer("v2", Err(FlowsmithError::Network("reset".into()))),
    );

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap();

    assert_eq!(submission.version, "v1");
    assert_eq!(store.submitted(), vec!["v2", "v1"]);
}

#[tokio::test]
async fn test_missing_artifact_is_created_before_the_first_version() {
    let store = Arc::new(ScriptedStore::new(&[]));
    store.artifact_exists.store(false, Ordering::SeqCst);

    let submission = manager(&store)
        .resolve_writable_version("support-bot", "doc", None)
        .await
        .unwrap();

    assert_eq!(submission.version, "v1");
    assert_eq!(store.artifact_creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.version_creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ensure_artifact_retries_version_create_exactly_once() {
    let mut scripted = ScriptedStore::new(&[]);
    scripted.artifact_creation_sticks = false;
    let store = Arc::new(scripted);
    store.artifact_exists.store(false, Ordering::SeqCst);

    let err = manager(&store).ensure_artifact("support-bot", "v1").await.unwrap_err();

    assert!(matches!(err, FlowsmithError::Remote { status: Some(404), .. }));
    assert_eq!(store.artifact_creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.version_creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_validate_creates_artifact_and_first_version() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let client = ValidatorClient::new(Arc::clone(&store) as Arc<dyn ArtifactStore>);

    let report = client.validate(&valid_document(), "support-bot", None).await.unwrap();

    assert!(report.accepted);
    assert_eq!(report.version_id, "v1");
    assert!(store.has_artifact("support-bot"));
}

#[tokio::test]
async fn test_validate_reports_content_errors() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let client = ValidatorClient::new(Arc::clone(&store) as Arc<dyn ArtifactStore>);
    let broken = serialize(&[
        Node::decision(1, "Welcome").with_next([2]),
        Node::decision(2, "Menu").with_next([99]),
    ]);

    let report = client.validate(&broken, "support-bot", None).await.unwrap();

    assert!(!report.accepted);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].node_identifier, Some(flowsmith_types::NodeId::new(2)));
}

#[tokio::test]
async fn test_named_locked_version_falls_back_to_resolution() {
    let store = Arc::new(InMemoryArtifactStore::new());
    store.seed("support-bot", &[("v1", false), ("v2", true)]);
    let client = ValidatorClient::new(Arc::clone(&store) as Arc<dyn ArtifactStore>);

    let report = client
        .validate(&valid_document(), "support-bot", Some("v2"))
        .await
        .unwrap();

    assert!(report.accepted);
    assert_eq!(report.version_id, "v1");
}

#[tokio::test]
async fn test_publish_deploys_and_next_publish_moves_to_a_new_version() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let client = ValidatorClient::new(Arc::clone(&store) as Arc<dyn ArtifactStore>);
    let document = valid_document();

    let first = client
        .publish(&document, "support-bot", None, Some("staging"))
        .await
        .unwrap();
    assert!(first.success && first.deployed);
    assert_eq!(first.version_id, "v1");
    assert_eq!(first.preview_locator.as_deref(), Some("memory://support-bot/v1/staging"));

    let second = client
        .publish(&document, "support-bot", Some("v1"), None)
        .await
        .unwrap();
    assert_eq!(second.version_id, "v2");
    assert!(!second.deployed);
    assert!(second.preview_locator.is_none());
}

#[tokio::test]
async fn test_publish_fails_on_content_errors() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let client = ValidatorClient::new(Arc::clone(&store) as Arc<dyn ArtifactStore>);
    let broken = serialize(&[Node::action(1, "Call", "")]);

    let err = client
        .publish(&broken, "support-bot", None, Some("production"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowsmithError::ContentValidation(ref errors) if errors.len() == 1));
}
