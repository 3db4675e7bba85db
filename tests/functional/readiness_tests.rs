//! Tests for the readiness evaluator: reset/recompute behavior, endpoint
//! derivation and requeue classification.

use cluster_operator::controller::context::ClusterContext;
use cluster_operator::controller::error::{DEFAULT_REQUEUE, Error, Outcome};
use cluster_operator::controller::readiness::evaluate_readiness;
use cluster_operator::crd::READY_ANNOTATION;
use kube::ResourceExt;

use crate::mock_state::{MockProbe, ProbeBehavior, stale_ready_cluster, test_cluster};

#[tokio::test]
async fn test_reachable_cluster_becomes_ready() {
    let cluster = test_cluster("alpha");
    let mut ctx = ClusterContext::new(&cluster).unwrap();
    let probe = MockProbe::reachable();

    let outcome = evaluate_readiness(&mut ctx, &probe).await.unwrap();
    assert_eq!(outcome, Outcome::Done);

    let status = ctx.cluster.status.as_ref().unwrap();
    assert!(status.ready);
    assert_eq!(status.api_endpoints.len(), 1);
    assert_eq!(status.api_endpoints[0].host, "10.0.0.5");
    assert_eq!(status.api_endpoints[0].port, Some(6443));
    assert!(ctx.cluster.annotations().contains_key(READY_ANNOTATION));
    assert_eq!(ctx.kubeadm.control_plane_endpoint, "10.0.0.5:6443");
}

#[tokio::test]
async fn test_stale_state_is_always_reset() {
    // Prior ready state must not leak through a failed probe.
    let cluster = stale_ready_cluster("alpha");
    let mut ctx = ClusterContext::new(&cluster).unwrap();
    let probe = MockProbe::new(ProbeBehavior::ConnectError);

    let outcome = evaluate_readiness(&mut ctx, &probe).await.unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(DEFAULT_REQUEUE));

    let status = ctx.cluster.status.as_ref().unwrap();
    assert!(!status.ready);
    assert!(status.api_endpoints.is_empty());
    assert!(!ctx.cluster.annotations().contains_key(READY_ANNOTATION));
}

#[tokio::test]
async fn test_stale_endpoint_is_replaced_not_appended() {
    let cluster = stale_ready_cluster("alpha");
    let mut ctx = ClusterContext::new(&cluster).unwrap();
    let probe = MockProbe::reachable();

    evaluate_readiness(&mut ctx, &probe).await.unwrap();

    let status = ctx.cluster.status.as_ref().unwrap();
    assert_eq!(status.api_endpoints.len(), 1);
    assert_eq!(status.api_endpoints[0].host, "10.0.0.5");
}

#[tokio::test]
async fn test_evaluation_is_idempotent() {
    let cluster = test_cluster("alpha");
    let mut ctx = ClusterContext::new(&cluster).unwrap();
    let probe = MockProbe::reachable();

    evaluate_readiness(&mut ctx, &probe).await.unwrap();
    let first_status = ctx.cluster.status.clone();
    let first_annotations = ctx.cluster.annotations().clone();
    let first_endpoint = ctx.kubeadm.control_plane_endpoint.clone();

    let outcome = evaluate_readiness(&mut ctx, &probe).await.unwrap();
    assert_eq!(outcome, Outcome::Done);

    let second_status = ctx.cluster.status.clone();
    assert_eq!(
        serde_json::to_value(&first_status).unwrap(),
        serde_json::to_value(&second_status).unwrap()
    );
    assert_eq!(&first_annotations, ctx.cluster.annotations());
    assert_eq!(first_endpoint, ctx.kubeadm.control_plane_endpoint);
}

#[tokio::test]
async fn test_annotation_tracks_ready_flag() {
    // Ready pass sets both together.
    let mut ctx = ClusterContext::new(&test_cluster("alpha")).unwrap();
    evaluate_readiness(&mut ctx, &MockProbe::reachable())
        .await
        .unwrap();
    assert!(ctx.cluster.status.as_ref().unwrap().ready);
    assert!(ctx.cluster.annotations().contains_key(READY_ANNOTATION));

    // Unready pass clears both together.
    let mut ctx = ClusterContext::new(&stale_ready_cluster("beta")).unwrap();
    evaluate_readiness(&mut ctx, &MockProbe::new(ProbeBehavior::ListError))
        .await
        .unwrap();
    assert!(!ctx.cluster.status.as_ref().unwrap().ready);
    assert!(!ctx.cluster.annotations().contains_key(READY_ANNOTATION));
}

#[tokio::test]
async fn test_probe_failures_requeue_with_default_delay() {
    for behavior in [
        ProbeBehavior::ConnectError,
        ProbeBehavior::ListError,
        ProbeBehavior::NoEndpoint,
    ] {
        let mut ctx = ClusterContext::new(&test_cluster("alpha")).unwrap();
        let probe = MockProbe::new(behavior.clone());

        let outcome = evaluate_readiness(&mut ctx, &probe).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::RequeueAfter(DEFAULT_REQUEUE),
            "behavior {behavior:?} must requeue with the default delay"
        );
        assert!(!ctx.cluster.status.as_ref().unwrap().ready);
    }
}

#[tokio::test]
async fn test_malformed_endpoint_is_fatal() {
    let mut ctx = ClusterContext::new(&test_cluster("alpha")).unwrap();
    let probe = MockProbe::new(ProbeBehavior::Endpoint(
        "https://10.0.0.5:notaport".to_string(),
    ));

    let err = evaluate_readiness(&mut ctx, &probe)
        .await
        .expect_err("malformed endpoint must fail the pass");
    assert!(matches!(err, Error::MalformedEndpoint(_)));

    // The pass failed after the reset, so the cluster is left not ready.
    let status = ctx.cluster.status.as_ref().unwrap();
    assert!(!status.ready);
    assert!(status.api_endpoints.is_empty());
    assert!(!ctx.cluster.annotations().contains_key(READY_ANNOTATION));
}

#[tokio::test]
async fn test_host_only_endpoint_has_no_port() {
    let mut ctx = ClusterContext::new(&test_cluster("alpha")).unwrap();
    let probe = MockProbe::new(ProbeBehavior::Endpoint("https://10.0.0.5".to_string()));

    evaluate_readiness(&mut ctx, &probe).await.unwrap();

    let status = ctx.cluster.status.as_ref().unwrap();
    assert_eq!(status.api_endpoints[0].host, "10.0.0.5");
    assert_eq!(status.api_endpoints[0].port, None);
    // Authority without a port is just the host.
    assert_eq!(ctx.kubeadm.control_plane_endpoint, "10.0.0.5");
}

#[tokio::test]
async fn test_control_plane_endpoint_left_alone_when_in_sync() {
    let mut cluster = test_cluster("alpha");
    if let Some(kubeadm) = cluster.spec.kubeadm.as_mut() {
        kubeadm.control_plane_endpoint = "10.0.0.5:6443".to_string();
    }
    let mut ctx = ClusterContext::new(&cluster).unwrap();

    evaluate_readiness(&mut ctx, &MockProbe::reachable())
        .await
        .unwrap();
    assert_eq!(ctx.kubeadm.control_plane_endpoint, "10.0.0.5:6443");
}
