//! Collaborator seams for the reconciler.
//!
//! Each external capability the orchestrators depend on is expressed as a
//! trait so the reconciliation core can be exercised without a live
//! cluster. Production implementations live in [`crate::remote`],
//! [`crate::store`] and [`crate::trust`].

use async_trait::async_trait;

use crate::controller::context::ClusterContext;
use crate::controller::error::Result;
use crate::crd::ManagedCluster;

/// Ensures certificate/key material exists and is current for a cluster.
///
/// Called once per reconciliation; opaque beyond its error contract.
#[async_trait]
pub trait TrustReconciler: Send + Sync {
    async fn reconcile_trust(&self, ctx: &mut ClusterContext) -> Result<()>;
}

/// Produces clients for a cluster's own (remote) control plane.
#[async_trait]
pub trait RemoteProbe: Send + Sync {
    type Client: RemoteClient;

    /// Build a client for the remote API of the named cluster.
    async fn connect(&self, name: &str, namespace: &str) -> Result<Self::Client>;
}

/// A client connected to a remote control plane, used purely to test
/// reachability and to read back the endpoint the API is listening on.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// List node objects on the remote side as a liveness probe.
    async fn list_nodes(&self) -> Result<()>;

    /// The connection endpoint the client was configured with, as a URL.
    fn advertised_endpoint(&self) -> Option<String>;
}

/// Persists the in-memory working copy of a ManagedCluster.
///
/// Invoked exactly once at the exit point of every reconcile/delete pass;
/// must tolerate no-op patches.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn patch(&self, cluster: &ManagedCluster) -> Result<()>;
}

/// Outcome of a secret deletion attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecretDeletion {
    /// The secret existed and was removed.
    Deleted,
    /// The secret was already absent.
    NotFound,
}

/// Removes derived secrets for a cluster.
#[async_trait]
pub trait SecretCleaner: Send + Sync {
    /// Delete a secret, reporting "already absent" as a distinguished
    /// non-error outcome.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<SecretDeletion>;
}
