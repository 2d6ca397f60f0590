//! Usage edges: the consumption ledger.
//!
//! Usage is never a mutable counter. Each consumption becomes one immutable
//! ledger entry, and the current usage for any window is re-derived by
//! summing entries at read time. That keeps the system auditable and avoids
//! a second source of truth that can drift.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::common::{DomainError, EntityId};
use crate::entity::{ConsumptionUnit, Entity, EntityProps, EntityTag, UsageConsumption, UsageProps};
use crate::query::{where_eq, Query};
use crate::repository::BaseEntityRepository;

use super::require_id;

/// Append one ledger entry: `subject_id` consumed `consumption` on `target`.
pub async fn record_usage(
    repo: &dyn BaseEntityRepository,
    subject_id: EntityId,
    target: &Entity,
    consumption: UsageConsumption,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::Usage(UsageProps {
        source_id: subject_id,
        target_id: require_id(target)?,
        target_type: target.tag(),
        consumption: consumption.clone(),
    }));
    debug!(subject = %subject_id, value = consumption.value, unit = ?consumption.unit, "recording usage");
    repo.set(edge).await
}

/// Live summation over the ledger: total consumption of `unit` by
/// `subject_id` whose event timestamp falls at or after `window_start`.
pub async fn sum_usage_since(
    repo: &dyn BaseEntityRepository,
    subject_id: EntityId,
    unit: ConsumptionUnit,
    window_start: DateTime<Utc>,
) -> Result<f64, DomainError> {
    let entries = repo
        .query(
            &Query::builder()
                .filter(where_eq("props.source_id", subject_id))
                .build(),
            Some(EntityTag::Usage),
        )
        .await?;

    let sum = entries
        .iter()
        .filter_map(|entry| {
            let props = entry.as_usage()?;
            let meta = entry.meta.as_ref()?;
            (props.consumption.unit == unit && meta.created_at >= window_start)
                .then_some(props.consumption.value)
        })
        .sum();
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MessageProps;
    use crate::repository::memory_repository;
    use chrono::Duration;

    async fn target(repo: &dyn BaseEntityRepository) -> Entity {
        repo.set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sum_is_derived_from_entries() {
        let repo = memory_repository();
        let subject = EntityId::new();
        let t = target(repo.as_ref()).await;

        record_usage(
            repo.as_ref(),
            subject,
            &t,
            UsageConsumption::direct(ConsumptionUnit::Seconds, 25.0),
        )
        .await
        .unwrap();
        record_usage(
            repo.as_ref(),
            subject,
            &t,
            UsageConsumption::direct(ConsumptionUnit::Seconds, 10.0),
        )
        .await
        .unwrap();
        // Different unit and different subject are both excluded.
        record_usage(
            repo.as_ref(),
            subject,
            &t,
            UsageConsumption::direct(ConsumptionUnit::Tokens, 500.0),
        )
        .await
        .unwrap();
        record_usage(
            repo.as_ref(),
            EntityId::new(),
            &t,
            UsageConsumption::direct(ConsumptionUnit::Seconds, 99.0),
        )
        .await
        .unwrap();

        let window_start = Utc::now() - Duration::hours(1);
        let sum = sum_usage_since(repo.as_ref(), subject, ConsumptionUnit::Seconds, window_start)
            .await
            .unwrap();
        assert_eq!(sum, 35.0);
    }

    #[tokio::test]
    async fn test_entries_before_window_are_excluded() {
        let repo = memory_repository();
        let subject = EntityId::new();
        let t = target(repo.as_ref()).await;

        record_usage(
            repo.as_ref(),
            subject,
            &t,
            UsageConsumption::direct(ConsumptionUnit::Seconds, 40.0),
        )
        .await
        .unwrap();

        let window_start = Utc::now() + Duration::seconds(1);
        let sum = sum_usage_since(repo.as_ref(), subject, ConsumptionUnit::Seconds, window_start)
            .await
            .unwrap();
        assert_eq!(sum, 0.0);
    }
}
