//! Contexts for the controller.
//!
//! [`Context`] is the long-lived state shared by every reconciliation:
//! the Kubernetes client, the event recorder and the collaborator
//! implementations. [`ClusterContext`] is the request-scoped working
//! context built at the start of each reconcile/delete call and dropped
//! at its end.

use std::sync::Arc;

use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};

use crate::controller::collaborators::{ClusterStore, RemoteProbe, SecretCleaner, TrustReconciler};
use crate::controller::error::{Error, Result};
use crate::crd::{KubeadmClusterConfiguration, ManagedCluster};
use crate::health::HealthState;

/// Field manager name for the operator
pub const FIELD_MANAGER: &str = "cluster-operator";

/// Shared context for the controller
#[derive(Clone)]
pub struct Context<T, P, S, K> {
    /// Kubernetes client
    pub client: Client,
    /// Event reporter identity
    reporter: Reporter,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
    /// Trust material reconciliation
    pub trust: T,
    /// Remote control plane probing
    pub probe: P,
    /// Resource persistence
    pub store: S,
    /// Derived-secret cleanup
    pub secrets: K,
}

impl<T, P, S, K> Context<T, P, S, K>
where
    T: TrustReconciler,
    P: RemoteProbe,
    S: ClusterStore,
    K: SecretCleaner,
{
    /// Create a new context from collaborator implementations
    pub fn new(
        client: Client,
        health_state: Option<Arc<HealthState>>,
        trust: T,
        probe: P,
        store: S,
        secrets: K,
    ) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
            health_state,
            trust,
            probe,
            store,
            secrets,
        }
    }

    /// Create an event recorder for publishing Kubernetes events
    fn recorder(&self) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone())
    }

    /// Publish a normal event for a cluster
    pub async fn publish_normal_event(
        &self,
        cluster: &ManagedCluster,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(cluster, EventType::Normal, reason, action, note)
            .await;
    }

    /// Publish a warning event for a cluster
    pub async fn publish_warning_event(
        &self,
        cluster: &ManagedCluster,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(cluster, EventType::Warning, reason, action, note)
            .await;
    }

    async fn publish_event(
        &self,
        cluster: &ManagedCluster,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let recorder = self.recorder();
        let object_ref = cluster.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note,
                    action: action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}

/// Request-scoped context for one reconcile or delete call.
///
/// Owns a mutable working copy of the ManagedCluster and its resolved
/// kubeadm configuration. Mutations accumulate here and are written back
/// exactly once via [`ClusterContext::finish`], regardless of which step
/// failed.
#[derive(Debug)]
pub struct ClusterContext {
    /// Mutable working copy of the stored resource.
    pub cluster: ManagedCluster,
    /// Resolved kubeadm configuration, reinstalled into the working copy
    /// by `finish`.
    pub kubeadm: KubeadmClusterConfiguration,
    /// Cluster name.
    pub name: String,
    /// Cluster namespace.
    pub namespace: String,
}

impl ClusterContext {
    /// Build a working context from a stored resource.
    ///
    /// Fails when the cluster-scoped configuration cannot be resolved;
    /// that failure is fatal and never retried.
    pub fn new(cluster: &ManagedCluster) -> Result<Self> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

        let kubeadm = cluster.spec.kubeadm.clone().ok_or_else(|| {
            Error::Context(format!(
                "cluster {namespace}/{name} has no kubeadm cluster configuration"
            ))
        })?;

        Ok(Self {
            cluster: cluster.clone(),
            kubeadm,
            name,
            namespace,
        })
    }

    /// Consume the context, folding the resolved configuration back into
    /// the working copy for persistence.
    pub fn finish(mut self) -> ManagedCluster {
        self.cluster.spec.kubeadm = Some(self.kubeadm);
        self.cluster
    }
}

impl std::fmt::Display for ClusterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
