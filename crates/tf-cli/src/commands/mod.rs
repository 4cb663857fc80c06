//! CLI command implementations

pub(crate) mod common;
pub(crate) mod graph;
pub(crate) mod run;
pub(crate) mod tenants;
pub(crate) mod validate;
