//! Kubernetes-backed persistence for ManagedCluster working copies and
//! kubeconfig-secret cleanup.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client, ResourceExt,
    api::{DeleteParams, Patch, PatchParams},
};

use crate::controller::collaborators::{ClusterStore, SecretCleaner, SecretDeletion};
use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::Result;
use crate::crd::{ManagedCluster, READY_ANNOTATION};

/// Persists working copies through merge patches against object and
/// status subresource.
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl KubeClusterStore {
    /// Create a store backed by the management cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn patch(&self, cluster: &ManagedCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<ManagedCluster> = Api::namespaced(self.client.clone(), &namespace);

        // Merge patches leave absent keys untouched, so a ready
        // annotation the evaluator removed must be tombstoned with null.
        let mut annotations: serde_json::Map<String, serde_json::Value> = cluster
            .annotations()
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        annotations
            .entry(READY_ANNOTATION.to_string())
            .or_insert(serde_json::Value::Null);

        let patch = serde_json::json!({
            "metadata": { "annotations": annotations },
            "spec": cluster.spec,
        });
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        let status = serde_json::json!({
            "status": cluster.status.clone().unwrap_or_default()
        });
        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status),
        )
        .await?;

        Ok(())
    }
}

/// Deletes derived secrets, distinguishing "already absent".
#[derive(Clone)]
pub struct KubeSecretCleaner {
    client: Client,
}

impl KubeSecretCleaner {
    /// Create a cleaner backed by the management cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretCleaner for KubeSecretCleaner {
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<SecretDeletion> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(SecretDeletion::Deleted),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(SecretDeletion::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
