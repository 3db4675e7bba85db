//! Trust material reconciliation backed by cert-manager.
//!
//! Applies a Certificate for the cluster's CA/serving material via
//! server-side apply. Issuance and rotation themselves are cert-manager's
//! concern; this collaborator only converges the Certificate object.

use async_trait::async_trait;
use kube::{
    Api, Client,
    api::{ApiResource, DynamicObject, Patch, PatchParams},
};
use tracing::debug;

use crate::controller::collaborators::TrustReconciler;
use crate::controller::context::{ClusterContext, FIELD_MANAGER};
use crate::controller::error::Result;
use crate::resources::certificate::{generate_certificate, trust_secret_name};

/// TrustReconciler implementation that delegates issuance to cert-manager.
#[derive(Clone)]
pub struct CertManagerTrust {
    client: Client,
    issuer: String,
}

impl CertManagerTrust {
    /// Create a trust reconciler issuing from the named ClusterIssuer
    pub fn new(client: Client, issuer: impl Into<String>) -> Self {
        Self {
            client,
            issuer: issuer.into(),
        }
    }
}

#[async_trait]
impl TrustReconciler for CertManagerTrust {
    async fn reconcile_trust(&self, ctx: &mut ClusterContext) -> Result<()> {
        let certificate = generate_certificate(ctx, &self.issuer);
        let cert_name = trust_secret_name(&ctx.name);

        let cert_ar = ApiResource::from_gvk(&kube::api::GroupVersionKind {
            group: "cert-manager.io".to_string(),
            version: "v1".to_string(),
            kind: "Certificate".to_string(),
        });
        let cert_api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &ctx.namespace, &cert_ar);

        let cert_value: serde_json::Value = serde_json::to_value(&certificate)?;
        cert_api
            .patch(
                &cert_name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&cert_value),
            )
            .await?;

        debug!(cluster = %ctx, certificate = %cert_name, "applied trust certificate");
        Ok(())
    }
}
