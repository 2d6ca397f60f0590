//! Open/show classroom actions - read-only views over the graph.

use futures::try_join;

use crate::common::{DomainError, EntityId};
use crate::domains::classroom::edges::{occurs_in, participation, source};
use crate::entity::{Entity, EntityTag};
use crate::kernel::ClassroomDeps;
use crate::repository::BaseEntityRepository;

/// A message with its content resolved through the source edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub message: Entity,
    pub content: Entity,
}

/// Classroom, roster and message history.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassroomView {
    pub classroom: Entity,
    pub roster: Vec<Entity>,
    pub messages: Vec<MessageView>,
}

/// Build the full classroom view.
///
/// Pure reads: no saga. Roster and history lookups are independent, so they
/// run concurrently.
pub async fn show_classroom(
    classroom_id: EntityId,
    deps: &ClassroomDeps,
) -> Result<ClassroomView, DomainError> {
    let repo = deps.repository.as_ref();
    let classroom = repo
        .get(classroom_id)
        .await?
        .filter(|e| e.tag() == EntityTag::Classroom)
        .ok_or_else(|| DomainError::NotFound(format!("classroom {classroom_id}")))?;

    let (roster, message_ids) = try_join!(
        participation::roster(repo, classroom_id),
        occurs_in::messages_of(repo, classroom_id),
    )?;

    let mut messages = Vec::with_capacity(message_ids.len());
    for message_id in message_ids {
        let message = repo
            .get(message_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("message {message_id}")))?;
        let content = source::resolve_content(repo, message_id).await?;
        messages.push(MessageView { message, content });
    }

    Ok(ClassroomView {
        classroom,
        roster,
        messages,
    })
}

/// Open a classroom as a participant: membership is checked first.
pub async fn open_classroom(
    participant_id: EntityId,
    classroom_id: EntityId,
    deps: &ClassroomDeps,
) -> Result<ClassroomView, DomainError> {
    participation::ensure_participation(deps.repository.as_ref(), participant_id, classroom_id)
        .await?;
    show_classroom(classroom_id, deps).await
}
