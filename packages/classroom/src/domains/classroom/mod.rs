//! The classroom domain: participants exchange audio messages in
//! classrooms, gated by entitlement-based usage quotas.

pub mod actions;
pub mod authorize;
pub mod edges;
