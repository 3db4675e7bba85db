//! Certificate resource generation for cert-manager integration.
//!
//! Generates the cert-manager Certificate that backs a managed cluster's
//! trust material (control plane CA and serving certificate).

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::controller::context::ClusterContext;
use crate::crd::ManagedCluster;

// ============================================================================
// cert-manager Certificate types
// ============================================================================

/// cert-manager Certificate resource.
///
/// This is a simplified representation of the cert-manager Certificate CRD
/// for generating TLS certificates.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// API version for cert-manager Certificate.
    pub api_version: String,

    /// Kind is always "Certificate".
    pub kind: String,

    /// Standard object metadata.
    pub metadata: ObjectMeta,

    /// Certificate specification.
    pub spec: CertificateSpec,
}

/// Specification for a cert-manager Certificate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Name of the Secret that will contain the certificate.
    pub secret_name: String,

    /// Reference to the issuer responsible for issuing the certificate.
    pub issuer_ref: CertIssuerRef,

    /// DNS names to include in the certificate.
    pub dns_names: Vec<String>,

    /// Requested certificate validity duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// How long before expiry to renew the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,

    /// Key usages for the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usages: Option<Vec<String>>,
}

/// Reference to a cert-manager Issuer or ClusterIssuer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertIssuerRef {
    /// Name of the issuer.
    pub name: String,

    /// Kind of the issuer (Issuer or ClusterIssuer).
    pub kind: String,

    /// Group of the issuer (typically "cert-manager.io").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

// ============================================================================
// Certificate generation
// ============================================================================

/// Generate the trust secret name for a managed cluster.
pub fn trust_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-ca")
}

fn standard_labels(cluster: &ManagedCluster) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), cluster.name_any());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "cluster-operator".to_string(),
    );
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "trust".to_string(),
    );
    labels
}

fn owner_reference(cluster: &ManagedCluster) -> OwnerReference {
    OwnerReference {
        api_version: ManagedCluster::api_version(&()).to_string(),
        kind: ManagedCluster::kind(&()).to_string(),
        name: cluster.name_any(),
        uid: cluster.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
        ..Default::default()
    }
}

/// Generate a cert-manager Certificate carrying the cluster's trust
/// material.
///
/// DNS SANs cover the in-cluster API service names plus the currently
/// recorded control plane endpoint host, if any.
pub fn generate_certificate(ctx: &ClusterContext, issuer: &str) -> Certificate {
    let secret_name = trust_secret_name(&ctx.name);
    let dns_domain = &ctx.kubeadm.cluster_network.dns_domain;

    let mut dns_names = vec![
        "kubernetes".to_string(),
        "kubernetes.default".to_string(),
        "kubernetes.default.svc".to_string(),
        format!("kubernetes.default.svc.{dns_domain}"),
    ];
    if !ctx.kubeadm.control_plane_endpoint.is_empty() {
        let host = ctx
            .kubeadm
            .control_plane_endpoint
            .split(':')
            .next()
            .unwrap_or(&ctx.kubeadm.control_plane_endpoint);
        dns_names.push(host.to_string());
    }

    Certificate {
        api_version: "cert-manager.io/v1".to_string(),
        kind: "Certificate".to_string(),
        metadata: ObjectMeta {
            name: Some(secret_name.clone()),
            namespace: Some(ctx.namespace.clone()),
            labels: Some(standard_labels(&ctx.cluster)),
            owner_references: Some(vec![owner_reference(&ctx.cluster)]),
            ..Default::default()
        },
        spec: CertificateSpec {
            secret_name,
            issuer_ref: CertIssuerRef {
                name: issuer.to_string(),
                kind: "ClusterIssuer".to_string(),
                group: Some("cert-manager.io".to_string()),
            },
            dns_names,
            duration: Some("8760h".to_string()),
            renew_before: Some("720h".to_string()),
            usages: Some(vec!["server auth".to_string(), "client auth".to_string()]),
        },
    }
}
