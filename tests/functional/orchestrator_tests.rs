//! Tests for the reconcile orchestrator: step ordering, error wrapping
//! and the persist-on-every-exit-path invariant.

use std::sync::atomic::Ordering;

use cluster_operator::controller::error::{DEFAULT_REQUEUE, Error, Outcome};
use cluster_operator::controller::reconciler::reconcile_cluster;
use cluster_operator::crd::READY_ANNOTATION;
use kube::ResourceExt;

use crate::mock_state::{
    MockProbe, MockTrust, ProbeBehavior, RecordingStore, cluster_without_config,
    stale_ready_cluster, test_cluster,
};

#[tokio::test]
async fn test_successful_pass_persists_ready_cluster() {
    let cluster = test_cluster("alpha");
    let trust = MockTrust::ok();
    let probe = MockProbe::reachable();
    let store = RecordingStore::new();

    let outcome = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(trust.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.patch_count(), 1);

    let persisted = store.last_patched();
    let status = persisted.status.as_ref().unwrap();
    assert!(status.ready);
    assert_eq!(status.api_endpoints[0].host, "10.0.0.5");
    assert!(persisted.annotations().contains_key(READY_ANNOTATION));
    // The observed endpoint was folded back into the kubeadm config.
    assert_eq!(
        persisted.spec.kubeadm.as_ref().unwrap().control_plane_endpoint,
        "10.0.0.5:6443"
    );
}

#[tokio::test]
async fn test_context_failure_is_fatal() {
    let cluster = cluster_without_config("alpha");
    let trust = MockTrust::ok();
    let probe = MockProbe::reachable();
    let store = RecordingStore::new();

    let err = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .expect_err("missing configuration must fail the pass");
    assert!(matches!(err, Error::Context(_)));

    // No working copy ever existed, so there is nothing to persist and
    // no later step may run.
    assert_eq!(store.patch_count(), 0);
    assert_eq!(trust.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_trust_failure_is_wrapped_and_still_persisted() {
    let cluster = test_cluster("alpha");
    let trust = MockTrust::failing();
    let probe = MockProbe::reachable();
    let store = RecordingStore::new();

    let err = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .expect_err("trust failure must fail the pass");
    assert!(matches!(err, Error::TrustReconciliation { .. }));
    assert!(err.to_string().contains("default/alpha"));

    // Readiness evaluation never ran, but the patch step still did.
    assert_eq!(probe.connects.load(Ordering::SeqCst), 0);
    assert_eq!(store.patch_count(), 1);
}

#[tokio::test]
async fn test_transient_trust_failure_requeues() {
    let cluster = test_cluster("alpha");
    let trust = MockTrust::transient();
    let probe = MockProbe::reachable();
    let store = RecordingStore::new();

    let outcome = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(DEFAULT_REQUEUE));
    assert_eq!(store.patch_count(), 1);
}

#[tokio::test]
async fn test_probe_failure_persists_reset_state() {
    // A cluster that was ready loses its markers once the probe fails.
    let cluster = stale_ready_cluster("alpha");
    let trust = MockTrust::ok();
    let probe = MockProbe::new(ProbeBehavior::ConnectError);
    let store = RecordingStore::new();

    let outcome = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(DEFAULT_REQUEUE));
    assert_eq!(store.patch_count(), 1);

    let persisted = store.last_patched();
    let status = persisted.status.as_ref().unwrap();
    assert!(!status.ready);
    assert!(status.api_endpoints.is_empty());
    assert!(!persisted.annotations().contains_key(READY_ANNOTATION));
}

#[tokio::test]
async fn test_every_failing_step_still_patches_exactly_once() {
    struct Case {
        trust: MockTrust,
        probe: MockProbe,
    }
    let cases = vec![
        Case {
            trust: MockTrust::failing(),
            probe: MockProbe::reachable(),
        },
        Case {
            trust: MockTrust::transient(),
            probe: MockProbe::reachable(),
        },
        Case {
            trust: MockTrust::ok(),
            probe: MockProbe::new(ProbeBehavior::ConnectError),
        },
        Case {
            trust: MockTrust::ok(),
            probe: MockProbe::new(ProbeBehavior::ListError),
        },
        Case {
            trust: MockTrust::ok(),
            probe: MockProbe::new(ProbeBehavior::NoEndpoint),
        },
        Case {
            trust: MockTrust::ok(),
            probe: MockProbe::new(ProbeBehavior::Endpoint(
                "https://10.0.0.5:notaport".to_string(),
            )),
        },
    ];

    for (i, case) in cases.into_iter().enumerate() {
        let store = RecordingStore::new();
        let _ = reconcile_cluster(&test_cluster("alpha"), &case.trust, &case.probe, &store).await;
        assert_eq!(store.patch_count(), 1, "case {i} must patch exactly once");
    }
}

#[tokio::test]
async fn test_patch_failure_surfaces_when_steps_succeeded() {
    let cluster = test_cluster("alpha");
    let trust = MockTrust::ok();
    let probe = MockProbe::reachable();
    let store = RecordingStore::failing();

    let err = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .expect_err("patch failure must surface when it is the only error");
    assert!(matches!(err, Error::Kube(_)));
}

#[tokio::test]
async fn test_patch_failure_does_not_mask_primary_error() {
    let cluster = test_cluster("alpha");
    let trust = MockTrust::failing();
    let probe = MockProbe::reachable();
    let store = RecordingStore::failing();

    let err = reconcile_cluster(&cluster, &trust, &probe, &store)
        .await
        .expect_err("the pass must fail");
    // The trust error caused the pass to fail; the secondary patch
    // failure is logged, not returned.
    assert!(matches!(err, Error::TrustReconciliation { .. }));
}
