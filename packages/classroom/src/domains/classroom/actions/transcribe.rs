//! Transcribe action: attach transcript text to a message's audio.

use tracing::info;

use crate::common::{DomainError, EntityId};
use crate::domains::classroom::edges::{representation, source};
use crate::entity::{Entity, EntityProps, EntityTag, RepresentationType, TranscriptProps};
use crate::kernel::ClassroomDeps;
use crate::repository::BaseEntityRepository;
use crate::saga::Saga;

use super::rollback_quietly;

#[derive(Debug, Clone)]
pub struct TranscribeMessageRequest {
    pub message_id: EntityId,
    pub text: String,
    pub language: String,
}

/// Store a transcript for the audio behind a message.
///
/// The transcript becomes its own entity, linked to the audio by a
/// transcription representation edge. Messages whose content is not audio
/// cannot be transcribed.
pub async fn transcribe_message_audio(
    request: TranscribeMessageRequest,
    deps: &ClassroomDeps,
) -> Result<Entity, DomainError> {
    info!(message = %request.message_id, language = %request.language, "transcribing message audio");

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    let outcome = async {
        let content = source::resolve_content(&tx, request.message_id).await?;
        if content.tag() != EntityTag::Audio {
            return Err(DomainError::InvalidState(
                "message content is not audio".to_string(),
            ));
        }

        let transcript = tx
            .set(Entity::draft(EntityProps::Transcript(TranscriptProps {
                text: request.text.clone(),
                language: request.language.clone(),
            })))
            .await?;
        representation::create_representation(
            &tx,
            &transcript,
            &content,
            RepresentationType::Transcription,
        )
        .await?;
        Ok(transcript)
    }
    .await;

    match outcome {
        Ok(transcript) => Ok(transcript),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}
