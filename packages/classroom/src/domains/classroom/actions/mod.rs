//! Use-case scripts composing the repository, saga, edges, authorization and
//! the external collaborators.
//!
//! Every action takes a plain request value and the [`ClassroomDeps`]
//! bundle, and returns a domain result: expected conditions come back as
//! [`DomainError`](crate::common::DomainError) values, never panics. Actions
//! that write run inside one saga and roll back before surfacing any error,
//! so a failed flow leaves the graph exactly as it found it.

pub mod append_message;
pub mod create_classroom;
pub mod presigned_audio;
pub mod register_participant;
pub mod show_classroom;
pub mod transcribe;

pub use append_message::{append_message, AppendMessageRequest, AppendedMessage};
pub use create_classroom::{create_classroom, CreateClassroomRequest};
pub use presigned_audio::{
    create_presigned_audio, persist_audio, revoke_presigned_audio, CreatePresignedAudioRequest,
    PersistAudioRequest, PresignedAudio, RevokePresignedAudioRequest,
};
pub use register_participant::{register_participant, RegisterParticipantRequest};
pub use show_classroom::{open_classroom, show_classroom, ClassroomView, MessageView};
pub use transcribe::{transcribe_message_audio, TranscribeMessageRequest};

use tracing::warn;

use crate::repository::FederatedRepository;
use crate::saga::Saga;

/// Roll back after a failed flow. The original error is what callers must
/// see, so a compensation failure is only logged here.
pub(crate) async fn rollback_quietly(saga: &Saga, repository: &FederatedRepository) {
    if let Err(err) = saga.rollback(repository).await {
        warn!(error = %err, "saga rollback failed; graph may be left partially modified");
    }
}
