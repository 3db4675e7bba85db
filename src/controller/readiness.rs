//! Readiness evaluation for a ManagedCluster.
//!
//! Readiness is recomputed from scratch on every pass: the ready
//! annotation, the endpoint list and the status flag are cleared first
//! and only set again once the remote control plane has been probed
//! successfully. Remote unavailability is transient and yields a requeue
//! outcome; a malformed advertised endpoint is a data integrity problem
//! and fails the pass outright.

use kube::ResourceExt;
use tracing::debug;

use crate::controller::collaborators::{RemoteClient, RemoteProbe};
use crate::controller::context::ClusterContext;
use crate::controller::error::{Error, Outcome, Result};
use crate::crd::{ApiEndpoint, READY_ANNOTATION};

/// Evaluate readiness of the cluster behind `ctx`, mutating its working
/// copy in place.
pub async fn evaluate_readiness<P: RemoteProbe>(
    ctx: &mut ClusterContext,
    probe: &P,
) -> Result<Outcome> {
    // Ready state is determined every time during reconciliation; drop
    // whatever the previous pass left behind before probing.
    ctx.cluster.annotations_mut().remove(READY_ANNOTATION);
    let status = ctx.cluster.status.get_or_insert_with(Default::default);
    status.api_endpoints.clear();
    status.ready = false;

    let client = match probe.connect(&ctx.name, &ctx.namespace).await {
        Ok(client) => client,
        Err(err) => {
            debug!(cluster = %ctx, reason = %err, "unable to build client for workload cluster");
            return Ok(Outcome::requeue());
        }
    };

    // List the workload cluster's nodes to verify it is online. An empty
    // but reachable cluster is fine; only a request error counts.
    if let Err(err) = client.list_nodes().await {
        debug!(cluster = %ctx, reason = %err, "unable to list nodes on workload cluster");
        return Ok(Outcome::requeue());
    }

    let Some(advertised) = client.advertised_endpoint() else {
        debug!(cluster = %ctx, "workload cluster client has no advertised endpoint");
        return Ok(Outcome::requeue());
    };

    let endpoint = parse_endpoint(&advertised)?;
    debug!(
        cluster = %ctx,
        host = %endpoint.host,
        port = ?endpoint.port,
        "calculated API endpoint for workload cluster"
    );

    // The endpoint list only ever holds the single most recent entry;
    // concurrent passes converge to the same value instead of appending.
    let authority = endpoint.authority();
    ctx.cluster
        .status
        .get_or_insert_with(Default::default)
        .api_endpoints = vec![endpoint];

    // Propagate the observed endpoint back into the kubeadm configuration
    // so the persisted config matches what the API actually listens on.
    if ctx.kubeadm.control_plane_endpoint != authority {
        ctx.kubeadm.control_plane_endpoint = authority.clone();
        debug!(cluster = %ctx, control_plane_endpoint = %authority, "stored control plane endpoint in kubeadm configuration");
    }

    ctx.cluster
        .status
        .get_or_insert_with(Default::default)
        .ready = true;
    ctx.cluster
        .annotations_mut()
        .insert(READY_ANNOTATION.to_string(), String::new());

    debug!(cluster = %ctx, "cluster is ready");
    Ok(Outcome::Done)
}

/// Parse an advertised connection URL into an ApiEndpoint.
///
/// The host never carries scheme or path; the port is present iff the URL
/// named one. Any parse failure is fatal.
pub fn parse_endpoint(raw: &str) -> Result<ApiEndpoint> {
    let uri: http::Uri = raw
        .parse()
        .map_err(|err| Error::MalformedEndpoint(format!("{raw}: {err}")))?;

    let host = uri
        .host()
        .ok_or_else(|| Error::MalformedEndpoint(format!("{raw}: no host")))?;

    Ok(ApiEndpoint {
        host: host.to_string(),
        port: uri.port_u16().map(i32::from),
    })
}
