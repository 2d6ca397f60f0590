//! Participation edges: classroom membership.

use tracing::debug;

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, EntityTag, ParticipationProps, ParticipationRole};
use crate::query::{and, where_eq, Direction, Query};
use crate::repository::BaseEntityRepository;

/// Add `participant_id` to the classroom's roster.
pub async fn create_participation(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    classroom_id: EntityId,
    role: ParticipationRole,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::Participation(ParticipationProps {
        source_id: participant_id,
        target_id: classroom_id,
        role,
    }));
    debug!(participant = %participant_id, classroom = %classroom_id, role = ?role, "creating participation edge");
    repo.set(edge).await
}

/// Succeeds iff `participant_id` is on the classroom's roster.
pub async fn ensure_participation(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    classroom_id: EntityId,
) -> Result<(), DomainError> {
    let edges = repo
        .query(
            &Query::builder()
                .filter(and(vec![
                    where_eq("props.source_id", participant_id),
                    where_eq("props.target_id", classroom_id),
                ]))
                .limit(1)
                .build(),
            Some(EntityTag::Participation),
        )
        .await?;
    if edges.is_empty() {
        return Err(DomainError::Unauthorized(
            "not a participant of this classroom".to_string(),
        ));
    }
    Ok(())
}

/// The classroom's roster, in join order.
pub async fn roster(
    repo: &dyn BaseEntityRepository,
    classroom_id: EntityId,
) -> Result<Vec<Entity>, DomainError> {
    repo.query(
        &Query::builder()
            .filter(where_eq("props.target_id", classroom_id))
            .order_by("meta.created_at", Direction::Asc)
            .build(),
        Some(EntityTag::Participation),
    )
    .await
}
