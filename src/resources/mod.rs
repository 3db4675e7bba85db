//! Generators for resources the operator manages on behalf of clusters.

pub mod certificate;
