//! Representation edges: derived content → original.

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, EntityTag, RepresentationProps, RepresentationType};
use crate::query::{and, where_eq, Direction, Query};
use crate::repository::BaseEntityRepository;

use super::require_id;

/// Record that `derived` is a transcription/translation of `original`.
pub async fn create_representation(
    repo: &dyn BaseEntityRepository,
    derived: &Entity,
    original: &Entity,
    kind: RepresentationType,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::Representation(RepresentationProps {
        source_id: require_id(derived)?,
        target_id: require_id(original)?,
        target_type: original.tag(),
        kind,
    }));
    repo.set(edge).await
}

/// Ids of derived entities of one kind for an original, oldest first.
pub async fn representations_of(
    repo: &dyn BaseEntityRepository,
    original_id: EntityId,
    kind: RepresentationType,
) -> Result<Vec<EntityId>, DomainError> {
    let kind_value = serde_json::to_value(kind)
        .map_err(|e| DomainError::Internal(e.into()))?
        .as_str()
        .unwrap_or_default()
        .to_string();
    let edges = repo
        .query(
            &Query::builder()
                .filter(and(vec![
                    where_eq("props.target_id", original_id),
                    where_eq("props.type", kind_value),
                ]))
                .order_by("meta.created_at", Direction::Asc)
                .build(),
            Some(EntityTag::Representation),
        )
        .await?;
    Ok(edges
        .iter()
        .filter_map(|e| e.as_representation().map(|p| p.source_id))
        .collect())
}
