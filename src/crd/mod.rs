//! Custom Resource Definitions (CRDs) for cluster-operator.
//!
//! - `ManagedCluster`: a managed compute cluster reconciled against its
//!   own remote control plane.

mod managed_cluster;

pub use managed_cluster::*;
