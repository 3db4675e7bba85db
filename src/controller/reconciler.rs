//! Reconciliation loop for ManagedCluster.
//!
//! Contains the two orchestrators (reconcile and delete) plus the kube
//! controller entry points wrapping them. Both orchestrators persist the
//! working copy exactly once on every exit path, so progress made by an
//! earlier step (e.g. trust material) survives a later failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::{
    Api, ResourceExt,
    api::{Patch, PatchParams},
    runtime::controller::Action,
};
use tracing::{debug, error, info, warn};

use crate::{
    controller::{
        collaborators::{ClusterStore, RemoteProbe, SecretCleaner, SecretDeletion, TrustReconciler},
        context::{ClusterContext, Context, FIELD_MANAGER},
        error::{Error, Outcome, Result},
        readiness::evaluate_readiness,
    },
    crd::ManagedCluster,
    remote::kubeconfig_secret_name,
};

/// Finalizer name for graceful deletion
pub const FINALIZER: &str = "clusteroperator.example.com/finalizer";

/// Interval between full re-evaluations of a converged cluster
const RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Reconcile one ManagedCluster towards a consistent ready/not-ready state.
///
/// Steps run strictly in order and short-circuit on the first failure:
/// context construction (fatal on failure), trust reconciliation, then
/// readiness evaluation. Whatever was mutated by the time a step fails is
/// still written back through `store`.
pub async fn reconcile_cluster<T, P, S>(
    cluster: &ManagedCluster,
    trust: &T,
    probe: &P,
    store: &S,
) -> Result<Outcome>
where
    T: TrustReconciler,
    P: RemoteProbe,
    S: ClusterStore,
{
    // No working copy exists before the context does, so a context
    // failure has nothing to persist.
    let mut ctx = ClusterContext::new(cluster)?;
    debug!(cluster = %ctx, "reconciling cluster");

    let result = run_reconcile_steps(&mut ctx, trust, probe).await;
    persist_and_resolve(store, ctx, result).await
}

async fn run_reconcile_steps<T, P>(
    ctx: &mut ClusterContext,
    trust: &T,
    probe: &P,
) -> Result<Outcome>
where
    T: TrustReconciler,
    P: RemoteProbe,
{
    if let Err(err) = trust.reconcile_trust(ctx).await {
        if err.is_retryable() {
            debug!(cluster = %ctx, reason = %err, "trust reconciliation hit a transient condition");
            return Ok(Outcome::requeue());
        }
        return Err(Error::TrustReconciliation {
            cluster: ctx.to_string(),
            source: Box::new(err),
        });
    }

    evaluate_readiness(ctx, probe).await
}

/// Delete cluster-level resources for a ManagedCluster.
///
/// Removes the cluster's kubeconfig secret; "already absent" is success.
/// Any other failure requeues rather than failing, because kubeconfig
/// cleanup must not be skipped.
pub async fn delete_cluster<S, K>(
    cluster: &ManagedCluster,
    secrets: &K,
    store: &S,
) -> Result<Outcome>
where
    S: ClusterStore,
    K: SecretCleaner,
{
    let ctx = ClusterContext::new(cluster)?;
    info!(cluster = %ctx, "deleting cluster");

    let secret_name = kubeconfig_secret_name(&ctx.name);
    let result = match secrets.delete_secret(&ctx.namespace, &secret_name).await {
        Ok(SecretDeletion::Deleted) => {
            debug!(cluster = %ctx, secret = %secret_name, "deleted kubeconfig secret");
            Ok(Outcome::Done)
        }
        Ok(SecretDeletion::NotFound) => Ok(Outcome::Done),
        Err(err) => {
            warn!(
                cluster = %ctx,
                secret = %secret_name,
                reason = %err,
                "error deleting kubeconfig secret, requeueing"
            );
            Ok(Outcome::requeue())
        }
    };

    persist_and_resolve(store, ctx, result).await
}

/// Write the working copy back and fold a patch failure into the pass
/// result. The patch error only becomes the call's outcome when no
/// earlier error already carries it; a secondary persistence failure must
/// not mask the step that actually failed.
async fn persist_and_resolve<S: ClusterStore>(
    store: &S,
    ctx: ClusterContext,
    primary: Result<Outcome>,
) -> Result<Outcome> {
    let identity = ctx.to_string();
    let cluster = ctx.finish();

    match store.patch(&cluster).await {
        Ok(()) => primary,
        Err(patch_err) => match primary {
            Err(primary_err) => {
                warn!(
                    cluster = %identity,
                    reason = %patch_err,
                    "failed to persist cluster after reconcile error"
                );
                Err(primary_err)
            }
            Ok(_) => Err(patch_err),
        },
    }
}

/// Reconcile a ManagedCluster
///
/// This is the main reconciliation function called by the controller.
/// It handles finalizer management, deletion and the reconcile pass.
pub async fn reconcile<T, P, S, K>(
    obj: Arc<ManagedCluster>,
    ctx: Arc<Context<T, P, S, K>>,
) -> std::result::Result<Action, Error>
where
    T: TrustReconciler,
    P: RemoteProbe,
    S: ClusterStore,
    K: SecretCleaner,
{
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    debug!(name = %name, namespace = %namespace, "Reconciling ManagedCluster");

    let api: Api<ManagedCluster> = Api::namespaced(ctx.client.clone(), &namespace);

    // Handle deletion
    if obj.metadata.deletion_timestamp.is_some() {
        if !obj.finalizers().iter().any(|f| f == FINALIZER) {
            return Ok(Action::await_change());
        }
        return match delete_cluster(&obj, &ctx.secrets, &ctx.store).await? {
            Outcome::Done => {
                remove_finalizer(&api, &name).await?;
                Ok(Action::await_change())
            }
            Outcome::RequeueAfter(delay) => Ok(Action::requeue(delay)),
        };
    }

    // Ensure finalizer is present before any cluster-level resources are
    // derived, so deletion always runs cleanup.
    if !obj.finalizers().iter().any(|f| f == FINALIZER) {
        info!(name = %name, "Adding finalizer");
        add_finalizer(&api, &name).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let result = reconcile_cluster(&obj, &ctx.trust, &ctx.probe, &ctx.store).await;
    let announce_ready = became_ready(&obj, &result);

    // Record metrics
    if let Some(ref health_state) = ctx.health_state {
        let duration = start_time.elapsed().as_secs_f64();
        health_state
            .metrics
            .record_reconcile(&namespace, &name, duration);
        health_state
            .metrics
            .set_cluster_ready(&namespace, &name, matches!(result, Ok(Outcome::Done)));
        if result.is_ok() {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            health_state
                .last_reconcile
                .store(now, std::sync::atomic::Ordering::Relaxed);
        }
    }

    match result {
        Ok(Outcome::Done) => {
            // Converged passes repeat every resync; only the transition
            // into readiness is worth an event.
            if announce_ready {
                ctx.publish_normal_event(
                    &obj,
                    "Ready",
                    "Reconciling",
                    Some("Remote control plane is reachable".to_string()),
                )
                .await;
            }
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
        Ok(Outcome::RequeueAfter(delay)) => {
            debug!(name = %name, delay = ?delay, "Cluster not ready yet, requeueing");
            Ok(Action::requeue(delay))
        }
        Err(err) => {
            ctx.publish_warning_event(&obj, "ReconcileFailed", "Reconciling", Some(err.to_string()))
                .await;
            Err(err)
        }
    }
}

/// Whether this pass carried the cluster from not-ready to ready.
///
/// `prior` is the stored resource as it looked before the pass; a pass
/// that merely re-confirms an already ready cluster does not count.
fn became_ready(prior: &ManagedCluster, result: &Result<Outcome>) -> bool {
    let was_ready = prior.status.as_ref().is_some_and(|s| s.ready);
    !was_ready && matches!(result, Ok(Outcome::Done))
}

/// Error policy for the controller
pub fn error_policy<T, P, S, K>(
    obj: Arc<ManagedCluster>,
    error: &Error,
    ctx: Arc<Context<T, P, S, K>>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    // Record error metric
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
        Action::requeue(Duration::from_secs(30))
    } else {
        // Repeated fatal errors indicate bad data, not transience; park
        // the object on a slow cycle instead of hot-looping.
        error!(name = %name, error = %error, "Non-retryable error");
        Action::requeue(Duration::from_secs(300))
    }
}

/// Add finalizer to resource
async fn add_finalizer(api: &Api<ManagedCluster>, name: &str) -> Result<()> {
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": [FINALIZER]
        }
    });
    api.patch(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Remove finalizer from resource
async fn remove_finalizer(api: &Api<ManagedCluster>, name: &str) -> Result<()> {
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": null
        }
    });
    api.patch(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
