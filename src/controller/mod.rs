//! Controller module for cluster-operator.
//!
//! Contains the reconcile/delete orchestrators, readiness evaluation,
//! the request-scoped context, error handling and the collaborator seams
//! the orchestrators are built against.

pub mod collaborators;
pub mod context;
pub mod error;
pub mod readiness;
pub mod reconciler;
