//! Remote control plane probing.
//!
//! The production probe builds a client for a workload cluster from the
//! kubeconfig secret the cluster's provisioning left behind, lists nodes
//! as a liveness check and reports the server URL the kubeconfig points
//! at. Every failure here is treated as transient by the readiness
//! evaluator.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Secret};
use kube::{
    Api, Client,
    api::ListParams,
    config::{KubeConfigOptions, Kubeconfig},
};

use crate::controller::collaborators::{RemoteClient, RemoteProbe};
use crate::controller::error::{Error, Result};

/// Key under which the kubeconfig bytes live in the secret.
const KUBECONFIG_SECRET_KEY: &str = "value";

/// Deterministic name of the secret holding a cluster's kubeconfig.
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-kubeconfig")
}

/// Probe that connects to workload clusters via their kubeconfig secrets.
#[derive(Clone)]
pub struct KubeconfigProbe {
    client: Client,
}

impl KubeconfigProbe {
    /// Create a probe backed by the management cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteProbe for KubeconfigProbe {
    type Client = WorkloadClient;

    async fn connect(&self, name: &str, namespace: &str) -> Result<WorkloadClient> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets.get(&kubeconfig_secret_name(name)).await?;

        let data = secret.data.unwrap_or_default();
        let bytes = data.get(KUBECONFIG_SECRET_KEY).ok_or_else(|| {
            Error::RemoteProbe(format!(
                "kubeconfig secret for {namespace}/{name} has no {KUBECONFIG_SECRET_KEY:?} key"
            ))
        })?;
        let yaml = std::str::from_utf8(&bytes.0).map_err(|err| {
            Error::RemoteProbe(format!(
                "kubeconfig secret for {namespace}/{name} is not UTF-8: {err}"
            ))
        })?;

        let kubeconfig = Kubeconfig::from_yaml(yaml)?;
        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        let server = config.cluster_url.to_string();
        let client = Client::try_from(config)?;

        Ok(WorkloadClient { client, server })
    }
}

/// Client connected to one workload cluster's control plane.
pub struct WorkloadClient {
    client: Client,
    server: String,
}

#[async_trait]
impl RemoteClient for WorkloadClient {
    async fn list_nodes(&self) -> Result<()> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        // One item is enough; this only verifies the API answers.
        nodes.list(&ListParams::default().limit(1)).await?;
        Ok(())
    }

    fn advertised_endpoint(&self) -> Option<String> {
        if self.server.is_empty() {
            None
        } else {
            Some(self.server.clone())
        }
    }
}
