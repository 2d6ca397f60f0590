//! OccursIn edges: message → classroom.

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, EntityTag, OccursInProps};
use crate::query::{where_eq, Direction, Query};
use crate::repository::BaseEntityRepository;

/// Place a message into a classroom's history.
pub async fn create_occurs_in(
    repo: &dyn BaseEntityRepository,
    message_id: EntityId,
    classroom_id: EntityId,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::OccursIn(OccursInProps {
        source_id: message_id,
        target_id: classroom_id,
    }));
    repo.set(edge).await
}

/// Message ids of a classroom's history, oldest first.
pub async fn messages_of(
    repo: &dyn BaseEntityRepository,
    classroom_id: EntityId,
) -> Result<Vec<EntityId>, DomainError> {
    let edges = repo
        .query(
            &Query::builder()
                .filter(where_eq("props.target_id", classroom_id))
                .order_by("meta.created_at", Direction::Asc)
                .build(),
            Some(EntityTag::OccursIn),
        )
        .await?;
    Ok(edges
        .iter()
        .filter_map(|e| e.as_occurs_in().map(|p| p.source_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory_repository;

    #[tokio::test]
    async fn test_messages_of_in_append_order() {
        let repo = memory_repository();
        let classroom = EntityId::new();
        let m1 = EntityId::new();
        let m2 = EntityId::new();

        create_occurs_in(repo.as_ref(), m1, classroom).await.unwrap();
        create_occurs_in(repo.as_ref(), m2, classroom).await.unwrap();
        create_occurs_in(repo.as_ref(), EntityId::new(), EntityId::new())
            .await
            .unwrap();

        assert_eq!(messages_of(repo.as_ref(), classroom).await.unwrap(), vec![m1, m2]);
    }
}
