//! ManagedCluster Custom Resource Definition.
//!
//! Describes one managed compute cluster: its kubeadm-style configuration
//! (spec) and the readiness state the controller computes for it (status).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation set on a ManagedCluster iff `status.ready` is true.
///
/// The annotation and the status field are always written together; the
/// annotation carries no value.
pub const READY_ANNOTATION: &str = "clusteroperator.example.com/ready";

/// ManagedCluster is a custom resource describing a managed compute cluster
/// whose lifecycle is reconciled against its own (remote) control plane.
///
/// Example:
/// ```yaml
/// apiVersion: clusteroperator.example.com/v1alpha1
/// kind: ManagedCluster
/// metadata:
///   name: my-cluster
/// spec:
///   kubeadm:
///     kubernetesVersion: v1.32.0
///     controlPlaneEndpoint: ""
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "clusteroperator.example.com",
    version = "v1alpha1",
    kind = "ManagedCluster",
    plural = "managedclusters",
    shortname = "mc",
    status = "ManagedClusterStatus",
    namespaced,
    // Print columns for kubectl get
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint", "type":"string", "jsonPath":".status.apiEndpoints[0].host"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// kubeadm-style cluster configuration.
    ///
    /// Required for reconciliation; a ManagedCluster without it cannot be
    /// processed and fails context construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeadm: Option<KubeadmClusterConfiguration>,
}

/// kubeadm-style cluster configuration embedded in the spec.
///
/// `control_plane_endpoint` is kept in sync with the endpoint the remote
/// API is actually listening on, observed during readiness evaluation.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeadmClusterConfiguration {
    /// Kubernetes version to deploy (default: v1.32.0).
    #[serde(default = "default_kubernetes_version")]
    pub kubernetes_version: String,

    /// Advertised control plane endpoint as host or host:port.
    /// Updated by the controller from the observed remote endpoint.
    #[serde(default)]
    pub control_plane_endpoint: String,

    /// Cluster networking configuration.
    #[serde(default)]
    pub cluster_network: ClusterNetwork,
}

impl Default for KubeadmClusterConfiguration {
    fn default() -> Self {
        Self {
            kubernetes_version: default_kubernetes_version(),
            control_plane_endpoint: String::new(),
            cluster_network: ClusterNetwork::default(),
        }
    }
}

fn default_kubernetes_version() -> String {
    "v1.32.0".to_string()
}

/// Cluster networking configuration.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetwork {
    /// CIDR block for pod IPs (default: 192.168.0.0/16).
    #[serde(default = "default_pod_subnet")]
    pub pod_subnet: String,

    /// CIDR block for service IPs (default: 10.96.0.0/12).
    #[serde(default = "default_service_subnet")]
    pub service_subnet: String,

    /// Cluster DNS domain (default: cluster.local).
    #[serde(default = "default_dns_domain")]
    pub dns_domain: String,
}

impl Default for ClusterNetwork {
    fn default() -> Self {
        Self {
            pod_subnet: default_pod_subnet(),
            service_subnet: default_service_subnet(),
            dns_domain: default_dns_domain(),
        }
    }
}

fn default_pod_subnet() -> String {
    "192.168.0.0/16".to_string()
}

fn default_service_subnet() -> String {
    "10.96.0.0/12".to_string()
}

fn default_dns_domain() -> String {
    "cluster.local".to_string()
}

/// Status of a ManagedCluster.
///
/// Both fields are recomputed from scratch on every reconciliation pass;
/// the controller never merges them with prior state.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    /// Whether the remote control plane is reachable with a resolvable
    /// endpoint and trust material is reconciled.
    #[serde(default)]
    pub ready: bool,

    /// Externally reachable endpoints of the remote API.
    /// Holds at most one entry; always overwritten, never appended to.
    #[serde(default)]
    pub api_endpoints: Vec<ApiEndpoint>,
}

/// Externally reachable host (and optional port) of the remote API.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname or IP, never carrying a scheme or path.
    pub host: String,

    /// Port, present iff the source URL named one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl ApiEndpoint {
    /// Render as host or host:port, matching the URL authority the
    /// endpoint was derived from.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl std::fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority())
    }
}
