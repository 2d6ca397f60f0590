//! Create classroom action.

use tracing::info;

use crate::common::{DomainError, EntityId};
use crate::domains::classroom::edges::{ownership, participation};
use crate::entity::{ClassroomProps, Entity, EntityProps, EntityTag, ParticipationRole};
use crate::kernel::ClassroomDeps;
use crate::repository::BaseEntityRepository;
use crate::saga::Saga;

use super::rollback_quietly;

#[derive(Debug, Clone)]
pub struct CreateClassroomRequest {
    /// Participant creating the room; becomes its owner and first member.
    pub owner_id: EntityId,
    pub name: String,
    pub role: ParticipationRole,
    pub idempotency_key: Option<String>,
}

/// Create a classroom with its owner on the roster.
///
/// One saga: the classroom entity plus its ownership and participation
/// edges either all land or none do.
pub async fn create_classroom(
    request: CreateClassroomRequest,
    deps: &ClassroomDeps,
) -> Result<Entity, DomainError> {
    info!(owner = %request.owner_id, name = %request.name, "creating classroom");

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    match run(&request, &tx).await {
        Ok(classroom) => Ok(classroom),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}

async fn run(
    request: &CreateClassroomRequest,
    tx: &dyn BaseEntityRepository,
) -> Result<Entity, DomainError> {
    let owner = tx
        .get(request.owner_id)
        .await?
        .filter(|e| e.tag() == EntityTag::Participant)
        .ok_or_else(|| DomainError::NotFound(format!("participant {}", request.owner_id)))?;
    let owner_id = owner.id().unwrap_or(request.owner_id);

    let props = EntityProps::Classroom(ClassroomProps {
        name: request.name.clone(),
    });
    let draft = match &request.idempotency_key {
        Some(key) => Entity::draft_with_key(props, key.clone()),
        None => Entity::draft(props),
    };
    let classroom = tx.set(draft).await?;

    ownership::create_ownership(tx, owner_id, &classroom).await?;
    participation::create_participation(
        tx,
        owner_id,
        classroom.id().unwrap_or_default(),
        request.role,
    )
    .await?;

    Ok(classroom)
}
