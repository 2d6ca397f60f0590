//! Register participant action - maps an external subject onto a graph id.

use tracing::{debug, info};

use crate::common::DomainError;
use crate::entity::{Entity, EntityProps, EntityTag, ParticipantProps};
use crate::kernel::ClassroomDeps;
use crate::query::{where_eq, Query};
use crate::repository::BaseEntityRepository;

#[derive(Debug, Clone)]
pub struct RegisterParticipantRequest {
    /// External subject id (e.g. the auth provider's user id).
    pub subject_id: String,
}

/// Register a participant for an external subject.
///
/// Idempotent on `subject_id`: registering the same subject twice returns
/// the existing participant.
pub async fn register_participant(
    request: RegisterParticipantRequest,
    deps: &ClassroomDeps,
) -> Result<Entity, DomainError> {
    info!(subject = %request.subject_id, "registering participant");

    let existing = deps
        .repository
        .query(
            &Query::builder()
                .filter(where_eq("props.subject_id", request.subject_id.as_str()))
                .limit(1)
                .build(),
            Some(EntityTag::Participant),
        )
        .await?;
    if let Some(participant) = existing.into_iter().next() {
        debug!(id = %participant.id().unwrap_or_default(), "participant already registered");
        return Ok(participant);
    }

    deps.repository
        .set(Entity::draft(EntityProps::Participant(ParticipantProps {
            subject_id: request.subject_id,
        })))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::test_deps;

    #[tokio::test]
    async fn test_registering_same_subject_twice_returns_existing() {
        let deps = test_deps();
        let request = RegisterParticipantRequest {
            subject_id: "firebase:u1".to_string(),
        };
        let first = register_participant(request.clone(), &deps).await.unwrap();
        let second = register_participant(request, &deps).await.unwrap();
        assert_eq!(first.id(), second.id());
    }
}
