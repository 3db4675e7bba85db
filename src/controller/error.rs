//! Error types and reconciliation outcomes for the controller.
//!
//! Transient conditions are expressed through [`Outcome::RequeueAfter`],
//! never through an error variant, so callers branch on a tagged value
//! instead of inspecting error internals.

use std::time::Duration;
use thiserror::Error;

/// Default delay before a transient condition is retried.
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(20);

/// Error type for controller operations.
///
/// Every variant is fatal from the reconciler's point of view: the pass
/// stops, the partial mutation is persisted, and no retry hint is given.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig for a workload cluster could not be loaded
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Reconciliation context could not be constructed
    #[error("context error: {0}")]
    Context(String),

    /// A client for a remote control plane could not be built or used.
    /// The readiness evaluator treats these as transient and requeues.
    #[error("remote probe error: {0}")]
    RemoteProbe(String),

    /// Trust material reconciliation failed
    #[error("unable to reconcile trust material for cluster {cluster}: {source}")]
    TrustReconciliation {
        cluster: String,
        #[source]
        source: Box<Error>,
    },

    /// The remote API advertised an endpoint that cannot be parsed.
    /// Indicates a data integrity problem, not transient unavailability.
    #[error("malformed advertised endpoint: {0}")]
    MalformedEndpoint(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if this error should be retried by the controller runtime
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                // Retry on network errors, rate limiting, and server errors
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::Kubeconfig(_) | Error::RemoteProbe(_) => false,
            Error::Context(_) | Error::TrustReconciliation { .. } => false,
            Error::MalformedEndpoint(_) | Error::Serialization(_) => false,
        }
    }
}

/// Outcome of one reconciliation or deletion pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Every step converged.
    Done,
    /// A transient condition stopped the pass; retry after the delay.
    RequeueAfter(Duration),
}

impl Outcome {
    /// Requeue with the default delay.
    pub fn requeue() -> Self {
        Outcome::RequeueAfter(DEFAULT_REQUEUE)
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
