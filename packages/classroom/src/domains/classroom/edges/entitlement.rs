//! Granted and PolicyAggregate edges: entitlements and their quota policies.

use chrono::{DateTime, Utc};

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, EntityTag, GrantedProps, PolicyAggregateProps};
use crate::query::{where_eq, Query};
use crate::repository::BaseEntityRepository;

use super::require_id;

/// Grant an entitlement to a participant.
pub async fn grant(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    entitlement: &Entity,
    priority: i32,
    expires_at: DateTime<Utc>,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::Granted(GrantedProps {
        source_id: participant_id,
        target_id: require_id(entitlement)?,
        priority,
        expires_at,
    }));
    repo.set(edge).await
}

/// Bind a usage policy to an entitlement.
pub async fn attach_policy(
    repo: &dyn BaseEntityRepository,
    entitlement: &Entity,
    policy: &Entity,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::PolicyAggregate(PolicyAggregateProps {
        source_id: require_id(entitlement)?,
        target_id: require_id(policy)?,
    }));
    repo.set(edge).await
}

/// Unexpired grants for a participant, highest priority first. Expired
/// grants are invisible here; nothing ever deletes them.
pub async fn active_grants(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    now: DateTime<Utc>,
) -> Result<Vec<GrantedProps>, DomainError> {
    let edges = repo
        .query(
            &Query::builder()
                .filter(where_eq("props.source_id", participant_id))
                .build(),
            Some(EntityTag::Granted),
        )
        .await?;
    let mut grants: Vec<GrantedProps> = edges
        .iter()
        .filter_map(|e| e.as_granted())
        .filter(|g| g.expires_at > now)
        .cloned()
        .collect();
    grants.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(grants)
}

/// Policy ids bound to an entitlement.
pub async fn policies_of(
    repo: &dyn BaseEntityRepository,
    entitlement_id: EntityId,
) -> Result<Vec<EntityId>, DomainError> {
    let edges = repo
        .query(
            &Query::builder()
                .filter(where_eq("props.source_id", entitlement_id))
                .build(),
            Some(EntityTag::PolicyAggregate),
        )
        .await?;
    Ok(edges
        .iter()
        .filter_map(|e| e.as_policy_aggregate().map(|p| p.target_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitlementProps;
    use crate::repository::memory_repository;
    use chrono::Duration;

    async fn entitlement(repo: &dyn BaseEntityRepository, name: &str) -> Entity {
        repo.set(Entity::draft(EntityProps::Entitlement(EntitlementProps {
            name: name.to_string(),
        })))
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_expired_grants_are_invisible() {
        let repo = memory_repository();
        let participant = EntityId::new();
        let now = Utc::now();

        let trial = entitlement(repo.as_ref(), "trial").await;
        let premium = entitlement(repo.as_ref(), "premium").await;
        grant(repo.as_ref(), participant, &trial, 1, now - Duration::days(1))
            .await
            .unwrap();
        grant(repo.as_ref(), participant, &premium, 5, now + Duration::days(30))
            .await
            .unwrap();

        let active = active_grants(repo.as_ref(), participant, now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].target_id, premium.id().unwrap());
    }

    #[tokio::test]
    async fn test_active_grants_ordered_by_priority_desc() {
        let repo = memory_repository();
        let participant = EntityId::new();
        let now = Utc::now();
        let expires = now + Duration::days(1);

        let low = entitlement(repo.as_ref(), "low").await;
        let high = entitlement(repo.as_ref(), "high").await;
        grant(repo.as_ref(), participant, &low, 1, expires).await.unwrap();
        grant(repo.as_ref(), participant, &high, 9, expires).await.unwrap();

        let active = active_grants(repo.as_ref(), participant, now).await.unwrap();
        assert_eq!(active[0].priority, 9);
        assert_eq!(active[1].priority, 1);
    }
}
