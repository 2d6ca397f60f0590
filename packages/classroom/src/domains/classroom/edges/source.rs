//! Source edges: message → content.
//!
//! Message entities embed nothing; content is always reached through one of
//! these edges. Adding a new content variant means adding a `SourceType`, not
//! touching messages.

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityProps, EntityTag, SourceProps, SourceType};
use crate::query::{where_eq, Query};
use crate::repository::BaseEntityRepository;

use super::require_id;

fn source_type_of(content: &Entity) -> Result<SourceType, DomainError> {
    match content.tag() {
        EntityTag::Audio => Ok(SourceType::Audio),
        EntityTag::Transcript => Ok(SourceType::Transcript),
        other => Err(DomainError::Internal(anyhow::anyhow!(
            "{other:?} cannot be message content"
        ))),
    }
}

/// Link a message to its content entity.
pub async fn create_source(
    repo: &dyn BaseEntityRepository,
    message_id: EntityId,
    content: &Entity,
) -> Result<Entity, DomainError> {
    let edge = Entity::draft(EntityProps::Source(SourceProps {
        source_id: message_id,
        source_type: source_type_of(content)?,
        target_id: require_id(content)?,
    }));
    repo.set(edge).await
}

/// Follow the source edge from a message to its content entity.
pub async fn resolve_content(
    repo: &dyn BaseEntityRepository,
    message_id: EntityId,
) -> Result<Entity, DomainError> {
    let edges = repo
        .query(
            &Query::builder()
                .filter(where_eq("props.source_id", message_id))
                .limit(1)
                .build(),
            Some(EntityTag::Source),
        )
        .await?;
    let edge = edges
        .first()
        .and_then(|e| e.as_source())
        .ok_or_else(|| DomainError::NotFound(format!("content of message {message_id}")))?;
    repo.get(edge.target_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("content entity {}", edge.target_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AudioProps, AudioStatus, MessageProps};
    use crate::repository::memory_repository;

    #[tokio::test]
    async fn test_resolve_content_follows_edge() {
        let repo = memory_repository();
        let audio = repo
            .set(Entity::draft(EntityProps::Audio(AudioProps {
                status: AudioStatus::Persistent,
                mime_type: "audio/mpeg".to_string(),
                duration: None,
                url: Some("https://cdn.test/a1".to_string()),
                storage_ref: None,
                metadata: serde_json::Value::Null,
            })))
            .await
            .unwrap();
        let message = repo
            .set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap();

        create_source(repo.as_ref(), message.id().unwrap(), &audio)
            .await
            .unwrap();
        let content = resolve_content(repo.as_ref(), message.id().unwrap())
            .await
            .unwrap();
        assert_eq!(content.id(), audio.id());
        assert_eq!(content.tag(), EntityTag::Audio);
    }

    #[tokio::test]
    async fn test_message_without_source_is_not_found() {
        let repo = memory_repository();
        let message = repo
            .set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap();
        let err = resolve_content(repo.as_ref(), message.id().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_content_entity_rejected() {
        let repo = memory_repository();
        let message = repo
            .set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap();
        let other = repo
            .set(Entity::draft(EntityProps::Message(MessageProps::default())))
            .await
            .unwrap();
        let err = create_source(repo.as_ref(), message.id().unwrap(), &other)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
    }
}
