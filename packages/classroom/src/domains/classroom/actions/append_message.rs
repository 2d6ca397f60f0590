//! Append message action: turn a presigned upload into a classroom message.
//!
//! This is the longest write path in the domain: six writes and two calls to
//! external collaborators, all under one saga. A failure anywhere (including
//! inside media conversion, after the audio was already invalidated) rolls
//! every write back, so a failed append leaves the audio byte-for-byte as it
//! was and the classroom history untouched.

use tracing::info;

use crate::common::{DomainError, EntityId};
use crate::domains::classroom::edges::{occurs_in, ownership, participation, source};
use crate::entity::{AudioStatus, Entity, EntityProps, MessageProps};
use crate::kernel::ClassroomDeps;
use crate::repository::BaseEntityRepository;
use crate::saga::Saga;

use super::presigned_audio::{invalidate_presigned, load_audio, persist_bytes};
use super::rollback_quietly;

#[derive(Debug, Clone)]
pub struct AppendMessageRequest {
    pub classroom_id: EntityId,
    pub sender_id: EntityId,
    pub audio_id: EntityId,
    /// The signed url the sender was handed; must still match the audio.
    pub presigned_url: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppendedMessage {
    pub message: Entity,
    /// The audio after the presigned → persistent transition.
    pub audio: Entity,
}

/// Append an audio message to a classroom.
///
/// The sender must be a participant of the classroom and the owner of the
/// audio, and the audio must still be presigned with the exact url the
/// caller presents. On success the audio is persistent and the new message
/// points at it through a source edge.
pub async fn append_message(
    request: AppendMessageRequest,
    deps: &ClassroomDeps,
) -> Result<AppendedMessage, DomainError> {
    info!(
        classroom = %request.classroom_id,
        sender = %request.sender_id,
        audio = %request.audio_id,
        "appending message"
    );

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    match run(&request, &tx, deps).await {
        Ok(appended) => Ok(appended),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}

async fn run(
    request: &AppendMessageRequest,
    tx: &dyn BaseEntityRepository,
    deps: &ClassroomDeps,
) -> Result<AppendedMessage, DomainError> {
    participation::ensure_participation(tx, request.sender_id, request.classroom_id).await?;

    let audio = load_audio(tx, request.audio_id).await?;
    ownership::ensure_ownership_to_target_resource(tx, request.sender_id, &audio).await?;

    let props = audio
        .as_audio()
        .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("entity is not audio")))?;
    let url_matches = props.presigned_url() == Some(request.presigned_url.as_str());
    if props.status != AudioStatus::Presigned || !url_matches {
        return Err(DomainError::InvalidState(
            "Invalid audio to append".to_string(),
        ));
    }

    // First write: from here on the upload cannot be appended twice.
    let invalidated = invalidate_presigned(tx, &audio).await?;
    let persistent = persist_bytes(tx, deps, &invalidated).await?;

    let draft = match &request.idempotency_key {
        Some(key) => Entity::draft_with_key(EntityProps::Message(MessageProps::default()), key.clone()),
        None => Entity::draft(EntityProps::Message(MessageProps::default())),
    };
    let message = tx.set(draft).await?;
    let message_id = message.id().unwrap_or_default();

    source::create_source(tx, message_id, &persistent).await?;
    occurs_in::create_occurs_in(tx, message_id, request.classroom_id).await?;
    ownership::create_ownership(tx, request.sender_id, &message).await?;

    Ok(AppendedMessage {
        message,
        audio: persistent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::classroom::actions::create_classroom::{
        create_classroom, CreateClassroomRequest,
    };
    use crate::domains::classroom::actions::presigned_audio::{
        create_presigned_audio, CreatePresignedAudioRequest,
    };
    use crate::domains::classroom::actions::register_participant::{
        register_participant, RegisterParticipantRequest,
    };
    use crate::domains::classroom::actions::show_classroom::show_classroom;
    use crate::domains::classroom::edges::entitlement;
    use crate::entity::{
        Consumption, EntitlementProps, EntityTag, ParticipationRole,
    };
    use crate::kernel::test_dependencies::{test_deps_with, MockMultimedia, MockStorage};
    use crate::query::Query;
    use chrono::Utc;
    use std::sync::Arc;

    struct Fixture {
        deps: ClassroomDeps,
        storage: Arc<MockStorage>,
        sender: EntityId,
        classroom: EntityId,
        audio: Entity,
        presigned_url: String,
    }

    /// A registered sender with an unrestricted entitlement, a classroom they
    /// belong to, and a presigned audio with bytes already uploaded.
    async fn fixture(multimedia: MockMultimedia) -> Fixture {
        let storage = Arc::new(MockStorage::new());
        let deps = test_deps_with(storage.clone(), Arc::new(multimedia));

        let sender = register_participant(
            RegisterParticipantRequest {
                subject_id: "firebase:u1".to_string(),
            },
            &deps,
        )
        .await
        .unwrap()
        .id()
        .unwrap();
        let ent = deps
            .repository
            .set(Entity::draft(EntityProps::Entitlement(EntitlementProps {
                name: "premium".to_string(),
            })))
            .await
            .unwrap();
        entitlement::grant(
            deps.repository.as_ref(),
            sender,
            &ent,
            1,
            Utc::now() + chrono::Duration::days(30),
        )
        .await
        .unwrap();

        let classroom = create_classroom(
            CreateClassroomRequest {
                owner_id: sender,
                name: "Spanish 101".to_string(),
                role: ParticipationRole::Learner,
                idempotency_key: None,
            },
            &deps,
        )
        .await
        .unwrap()
        .id()
        .unwrap();

        let presigned = create_presigned_audio(
            CreatePresignedAudioRequest {
                owner_id: sender,
                mime_type: "audio/webm".to_string(),
                duration: Consumption::seconds(30.0),
                idempotency_key: None,
            },
            &deps,
        )
        .await
        .unwrap();
        let slot = presigned
            .audio
            .as_audio()
            .unwrap()
            .storage_ref
            .clone()
            .unwrap();
        storage.seed_blob(&slot.internal_id, b"uploaded-webm");

        Fixture {
            deps,
            storage,
            sender,
            classroom,
            audio: presigned.audio,
            presigned_url: presigned.presigned_url,
        }
    }

    fn request(f: &Fixture) -> AppendMessageRequest {
        AppendMessageRequest {
            classroom_id: f.classroom,
            sender_id: f.sender,
            audio_id: f.audio.id().unwrap(),
            presigned_url: f.presigned_url.clone(),
            idempotency_key: None,
        }
    }

    async fn edge_count(deps: &ClassroomDeps, tag: EntityTag) -> usize {
        deps.repository
            .query(&Query::default(), Some(tag))
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_append_message_scenario() {
        let f = fixture(MockMultimedia::new().with_duration(29.7)).await;

        let appended = append_message(request(&f), &f.deps).await.unwrap();

        let props = appended.audio.as_audio().unwrap();
        assert_eq!(props.status, AudioStatus::Persistent);
        assert_eq!(props.duration, Some(Consumption::seconds(29.7)));
        assert!(props.presigned_url().is_none());

        // The message shows up in the classroom history with its content.
        let view = show_classroom(f.classroom, &f.deps).await.unwrap();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].message.id(), appended.message.id());
        assert_eq!(view.messages[0].content.id(), appended.audio.id());

        // Converted bytes were re-uploaded.
        assert_eq!(f.storage.upload_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_presigned_url_is_invalid_audio() {
        let f = fixture(MockMultimedia::new()).await;
        let mut bad = request(&f);
        bad.presigned_url = "https://signed.test/someone-elses".to_string();

        let err = append_message(bad, &f.deps).await.unwrap_err();
        match err {
            DomainError::InvalidState(msg) => assert_eq!(msg, "Invalid audio to append"),
            other => panic!("expected InvalidState, got {other:?}"),
        }

        // Nothing was written: no message, no edges, audio still presigned.
        assert_eq!(edge_count(&f.deps, EntityTag::Message).await, 0);
        assert_eq!(edge_count(&f.deps, EntityTag::Source).await, 0);
        assert_eq!(edge_count(&f.deps, EntityTag::OccursIn).await, 0);
        let audio = f
            .deps
            .repository
            .get(f.audio.id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audio.as_audio().unwrap().status, AudioStatus::Presigned);
    }

    #[tokio::test]
    async fn test_second_append_of_same_audio_is_invalid() {
        let f = fixture(MockMultimedia::new()).await;
        append_message(request(&f), &f.deps).await.unwrap();

        let err = append_message(request(&f), &f.deps).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(edge_count(&f.deps, EntityTag::Message).await, 1);
    }

    #[tokio::test]
    async fn test_conversion_failure_restores_audio_byte_for_byte() {
        let f = fixture(MockMultimedia::new().with_failing_conversion()).await;
        let before = f
            .deps
            .repository
            .get(f.audio.id().unwrap())
            .await
            .unwrap()
            .unwrap();

        let err = append_message(request(&f), &f.deps).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));

        // The invalidation write happened before conversion and was rolled
        // back, updated_at included.
        let after = f
            .deps
            .repository
            .get(f.audio.id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, before);
        assert_eq!(edge_count(&f.deps, EntityTag::Message).await, 0);
        assert_eq!(edge_count(&f.deps, EntityTag::Source).await, 0);
    }

    #[tokio::test]
    async fn test_sender_must_be_a_participant() {
        let f = fixture(MockMultimedia::new()).await;
        let stranger = register_participant(
            RegisterParticipantRequest {
                subject_id: "firebase:u2".to_string(),
            },
            &f.deps,
        )
        .await
        .unwrap()
        .id()
        .unwrap();

        let mut req = request(&f);
        req.sender_id = stranger;
        let err = append_message(req, &f.deps).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sender_must_own_the_audio() {
        let f = fixture(MockMultimedia::new()).await;

        // A second member of the classroom who does not own the audio.
        let member = register_participant(
            RegisterParticipantRequest {
                subject_id: "firebase:u3".to_string(),
            },
            &f.deps,
        )
        .await
        .unwrap()
        .id()
        .unwrap();
        participation::create_participation(
            f.deps.repository.as_ref(),
            member,
            f.classroom,
            ParticipationRole::Learner,
        )
        .await
        .unwrap();

        let mut req = request(&f);
        req.sender_id = member;
        let err = append_message(req, &f.deps).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
