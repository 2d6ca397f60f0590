//! Authorization engine: gate a new consumption request.
//!
//! Evaluation walks grants → policy aggregates → policies, then re-derives
//! window usage from the ledger for each policy. All policies attached to
//! all evaluated grants must pass (conjunctive): a participant relying on
//! several entitlements has to satisfy every policy bound to any of them.
//!
//! A grant with zero attached policies contributes no constraint; it is
//! treated as unrestricted for that entitlement. That is intentional, and a
//! boundary case worth keeping under test.

use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::common::{DomainError, EntityId};
use crate::entity::{Aggregation, Consumption, ConsumptionUnit};
use crate::repository::BaseEntityRepository;

use super::edges::{entitlement, usage};

/// The summed ledger usage a policy was evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionWindow {
    pub value: f64,
}

/// One policy that was evaluated and passed, with the usage it saw. Callers
/// use this for telemetry and remaining-quota display.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedPolicy {
    pub policy_id: EntityId,
    pub max_consumption: f64,
    pub unit: ConsumptionUnit,
    pub consumption: ConsumptionWindow,
}

/// Start of the aggregation window containing `now` (UTC calendar).
fn window_start(aggregation: Aggregation, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    match aggregation {
        Aggregation::PerDay => midnight,
        Aggregation::PerWeek => {
            midnight - Duration::days(now.weekday().num_days_from_monday() as i64)
        }
        Aggregation::PerMonth => {
            let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
            first.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
        }
    }
}

/// Authorize `requested` consumption for a participant.
///
/// On success, returns every policy that was evaluated with the window usage
/// it saw. On failure, identifies the exhausted policy. Expired grants are
/// invisible here and are never deleted by this engine.
pub async fn authorize_consumption(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    requested: &Consumption,
) -> Result<Vec<EvaluatedPolicy>, DomainError> {
    authorize_consumption_at(repo, participant_id, requested, Utc::now()).await
}

/// Same as [`authorize_consumption`] with an explicit evaluation instant.
pub async fn authorize_consumption_at(
    repo: &dyn BaseEntityRepository,
    participant_id: EntityId,
    requested: &Consumption,
    now: DateTime<Utc>,
) -> Result<Vec<EvaluatedPolicy>, DomainError> {
    let grants = entitlement::active_grants(repo, participant_id, now).await?;
    if grants.is_empty() {
        return Err(DomainError::Unauthorized(
            "no active entitlement".to_string(),
        ));
    }

    let mut evaluated = Vec::new();
    let mut seen = HashSet::new();

    for grant in &grants {
        for policy_id in entitlement::policies_of(repo, grant.target_id).await? {
            // The same policy bound through several grants is one constraint.
            if !seen.insert(policy_id) {
                continue;
            }
            let policy = repo
                .get(policy_id)
                .await?
                .and_then(|e| e.as_usage_policy().cloned())
                .ok_or_else(|| DomainError::NotFound(format!("usage policy {policy_id}")))?;

            let start = window_start(policy.aggregation, now);
            let sum = usage::sum_usage_since(repo, participant_id, policy.unit, start).await?;

            // The request only counts against policies measuring its unit.
            let attempted = if policy.unit == requested.unit {
                sum + requested.value
            } else {
                sum
            };
            debug!(
                policy = %policy_id,
                window_usage = sum,
                attempted,
                max = policy.max_consumption,
                "evaluating usage policy"
            );
            if attempted > policy.max_consumption {
                info!(policy = %policy_id, "consumption rejected: quota exceeded");
                return Err(DomainError::QuotaExceeded {
                    policy_id,
                    max_consumption: policy.max_consumption,
                    attempted,
                });
            }
            evaluated.push(EvaluatedPolicy {
                policy_id,
                max_consumption: policy.max_consumption,
                unit: policy.unit,
                consumption: ConsumptionWindow { value: sum },
            });
        }
    }

    Ok(evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::classroom::edges::usage::record_usage;
    use crate::entity::{
        EntitlementProps, Entity, EntityProps, MessageProps, UsageConsumption, UsagePolicyProps,
    };
    use crate::repository::memory_repository;
    use std::sync::Arc;

    struct Fixture {
        repo: Arc<crate::repository::FederatedRepository>,
        participant: EntityId,
        entitlement: Entity,
    }

    async fn fixture() -> Fixture {
        let repo = memory_repository();
        let participant = EntityId::new();
        let ent = repo
            .set(Entity::draft(EntityProps::Entitlement(EntitlementProps {
                name: "premium".to_string(),
            })))
            .await
            .unwrap();
        entitlement::grant(
            repo.as_ref(),
            participant,
            &ent,
            1,
            Utc::now() + Duration::days(30),
        )
        .await
        .unwrap();
        Fixture {
            repo,
            participant,
            entitlement: ent,
        }
    }

    async fn per_day_policy(f: &Fixture, max: f64) -> EntityId {
        let policy = f
            .repo
            .set(Entity::draft(EntityProps::UsagePolicy(UsagePolicyProps {
                aggregation: Aggregation::PerDay,
                max_consumption: max,
                unit: ConsumptionUnit::Seconds,
            })))
            .await
            .unwrap();
        entitlement::attach_policy(f.repo.as_ref(), &f.entitlement, &policy)
            .await
            .unwrap();
        policy.id().unwrap()
    }

    async fn consume(f: &Fixture, value: f64) {
        let target = f
            .repo
            .set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap();
        record_usage(
            f.repo.as_ref(),
            f.participant,
            &target,
            UsageConsumption::direct(ConsumptionUnit::Seconds, value),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_no_active_entitlement() {
        let repo = memory_repository();
        let err = authorize_consumption(
            repo.as_ref(),
            EntityId::new(),
            &Consumption::seconds(10.0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_grant_with_zero_policies_is_unrestricted() {
        let f = fixture().await;
        let evaluated = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(1_000_000.0),
        )
        .await
        .unwrap();
        assert!(evaluated.is_empty());
    }

    #[tokio::test]
    async fn test_quota_scenario_prior_25_of_100() {
        let f = fixture().await;
        let policy_id = per_day_policy(&f, 100.0).await;
        consume(&f, 25.0).await;

        // requested 80 exceeds; the error names the exhausted policy.
        let err = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(80.0),
        )
        .await
        .unwrap_err();
        match err {
            DomainError::QuotaExceeded {
                policy_id: exhausted,
                max_consumption,
                attempted,
            } => {
                assert_eq!(exhausted, policy_id);
                assert_eq!(max_consumption, 100.0);
                assert_eq!(attempted, 105.0);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }

        // requested 10 passes and reports the window usage it saw.
        let evaluated = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(10.0),
        )
        .await
        .unwrap();
        assert_eq!(evaluated.len(), 1);
        assert_eq!(evaluated[0].consumption.value, 25.0);
    }

    #[tokio::test]
    async fn test_monotonic_boundary() {
        let f = fixture().await;
        per_day_policy(&f, 100.0).await;
        consume(&f, 25.0).await;

        // requested == M - U passes exactly.
        authorize_consumption(f.repo.as_ref(), f.participant, &Consumption::seconds(75.0))
            .await
            .unwrap();
        // one past the boundary fails.
        let err = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(76.0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_policy_across_grants_evaluated_once() {
        let f = fixture().await;
        let policy_id = per_day_policy(&f, 100.0).await;

        // A second grant binding the same policy.
        let other = f
            .repo
            .set(Entity::draft(EntityProps::Entitlement(EntitlementProps {
                name: "bundle".to_string(),
            })))
            .await
            .unwrap();
        entitlement::grant(
            f.repo.as_ref(),
            f.participant,
            &other,
            2,
            Utc::now() + Duration::days(5),
        )
        .await
        .unwrap();
        let policy = f.repo.get(policy_id).await.unwrap().unwrap();
        entitlement::attach_policy(f.repo.as_ref(), &other, &policy)
            .await
            .unwrap();

        let evaluated = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(10.0),
        )
        .await
        .unwrap();
        assert_eq!(evaluated.len(), 1);
    }

    #[tokio::test]
    async fn test_all_policies_conjunctive() {
        let f = fixture().await;
        per_day_policy(&f, 100.0).await;
        per_day_policy(&f, 30.0).await;
        consume(&f, 25.0).await;

        // Passes the 100 policy but not the 30 one.
        let err = authorize_consumption(
            f.repo.as_ref(),
            f.participant,
            &Consumption::seconds(10.0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_window_start_per_day() {
        let now = "2026-03-15T17:45:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            window_start(Aggregation::PerDay, now),
            "2026-03-15T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_window_start_per_week_is_monday() {
        // 2026-03-15 is a Sunday.
        let now = "2026-03-15T17:45:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            window_start(Aggregation::PerWeek, now),
            "2026-03-09T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_window_start_per_month() {
        let now = "2026-03-15T17:45:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            window_start(Aggregation::PerMonth, now),
            "2026-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
