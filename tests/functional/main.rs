// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the ManagedCluster reconciliation core.
//!
//! These tests exercise the real orchestrators and readiness evaluator
//! against mock collaborators, WITHOUT requiring a live Kubernetes
//! cluster.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Readiness tests**: the readiness evaluator's reset/recompute
//!   behavior, endpoint derivation and requeue classification
//! - **Orchestrator tests**: step ordering, error wrapping and the
//!   persist-on-every-exit-path invariant of Reconcile
//! - **Deletion tests**: idempotent kubeconfig-secret cleanup

mod deletion_tests;
mod orchestrator_tests;
mod readiness_tests;

// Re-export for use in tests
pub use mock_state::*;
