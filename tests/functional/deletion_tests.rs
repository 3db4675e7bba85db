//! Tests for the deletion orchestrator: idempotent kubeconfig-secret
//! cleanup with bounded retry on failure.

use cluster_operator::controller::error::{DEFAULT_REQUEUE, Error, Outcome};
use cluster_operator::controller::reconciler::delete_cluster;

use crate::mock_state::{
    MockSecretCleaner, RecordingStore, SecretOutcome, cluster_without_config, test_cluster,
};

#[tokio::test]
async fn test_deleting_present_secret_succeeds() {
    let cluster = test_cluster("alpha");
    let secrets = MockSecretCleaner::new(SecretOutcome::Deleted);
    let store = RecordingStore::new();

    let outcome = delete_cluster(&cluster, &secrets, &store).await.unwrap();
    assert_eq!(outcome, Outcome::Done);

    // The secret name is derived deterministically from the cluster name.
    let deletions = secrets.deletions.lock().unwrap();
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0].0, "default");
    assert_eq!(deletions[0].1, "alpha-kubeconfig");
}

#[tokio::test]
async fn test_deleting_absent_secret_is_success() {
    let cluster = test_cluster("alpha");
    let secrets = MockSecretCleaner::new(SecretOutcome::NotFound);
    let store = RecordingStore::new();

    let outcome = delete_cluster(&cluster, &secrets, &store).await.unwrap();
    assert_eq!(outcome, Outcome::Done);
}

#[tokio::test]
async fn test_transport_error_requeues_instead_of_failing() {
    let cluster = test_cluster("alpha");
    let secrets = MockSecretCleaner::new(SecretOutcome::TransportError);
    let store = RecordingStore::new();

    let outcome = delete_cluster(&cluster, &secrets, &store).await.unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(DEFAULT_REQUEUE));
    // The working copy is still persisted on the requeue path.
    assert_eq!(store.patch_count(), 1);
}

#[tokio::test]
async fn test_delete_persists_exactly_once() {
    for outcome in [
        SecretOutcome::Deleted,
        SecretOutcome::NotFound,
        SecretOutcome::TransportError,
    ] {
        let secrets = MockSecretCleaner::new(outcome);
        let store = RecordingStore::new();
        delete_cluster(&test_cluster("alpha"), &secrets, &store)
            .await
            .unwrap();
        assert_eq!(
            store.patch_count(),
            1,
            "outcome {outcome:?} must patch exactly once"
        );
    }
}

#[tokio::test]
async fn test_delete_without_configuration_is_fatal() {
    let cluster = cluster_without_config("alpha");
    let secrets = MockSecretCleaner::new(SecretOutcome::Deleted);
    let store = RecordingStore::new();

    let err = delete_cluster(&cluster, &secrets, &store)
        .await
        .expect_err("missing configuration must fail the pass");
    assert!(matches!(err, Error::Context(_)));
    assert!(secrets.deletions.lock().unwrap().is_empty());
}
