//! Domain operations over relationship entities.
//!
//! Every edge is an immutable append-only fact. These services create edges
//! and answer the graph questions domain flows ask (membership, ownership,
//! content resolution, usage summation, active entitlements). They work
//! against any [`BaseEntityRepository`](crate::repository::BaseEntityRepository),
//! so the same code runs inside and outside a saga.

pub mod entitlement;
pub mod occurs_in;
pub mod ownership;
pub mod participation;
pub mod representation;
pub mod source;
pub mod usage;

use crate::common::{DomainError, EntityId};
use crate::entity::Entity;

/// Edges can only point at persisted entities.
fn require_id(entity: &Entity) -> Result<EntityId, DomainError> {
    entity.id().ok_or_else(|| {
        DomainError::Internal(anyhow::anyhow!(
            "cannot create an edge to a draft {:?}",
            entity.tag()
        ))
    })
}
