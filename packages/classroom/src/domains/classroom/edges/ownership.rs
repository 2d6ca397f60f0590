//! Ownership edges: who may administer a resource.

use tracing::debug;

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, OwnershipProps};
use crate::query::{and, where_eq, Query};
use crate::repository::BaseEntityRepository;

use super::require_id;

/// Record that `owner_id` administers `target`. Append-only fact.
pub async fn create_ownership(
    repo: &dyn BaseEntityRepository,
    owner_id: EntityId,
    target: &Entity,
) -> Result<Entity, DomainError> {
    let target_id = require_id(target)?;
    let edge = Entity::draft(EntityProps::Ownership(OwnershipProps {
        source_id: owner_id,
        target_id,
        target_type: target.tag(),
    }));
    debug!(owner = %owner_id, target = %target_id, "creating ownership edge");
    repo.set(edge).await
}

/// Succeeds iff an ownership edge matches `(owner_id, target.id, target.tag)`
/// exactly. An edge with the right ids but the wrong target type does not
/// authorize.
pub async fn ensure_ownership_to_target_resource(
    repo: &dyn BaseEntityRepository,
    owner_id: EntityId,
    target: &Entity,
) -> Result<(), DomainError> {
    let target_id = require_id(target)?;
    let edges = repo
        .query(
            &Query::builder()
                .filter(and(vec![
                    where_eq("props.source_id", owner_id),
                    where_eq("props.target_id", target_id),
                    where_eq("props.target_type", target.tag()),
                ]))
                .limit(1)
                .build(),
            Some(crate::entity::EntityTag::Ownership),
        )
        .await?;
    if edges.is_empty() {
        return Err(DomainError::Unauthorized(format!(
            "no ownership of {:?} {target_id}",
            target.tag()
        )));
    }
    Ok(())
}
