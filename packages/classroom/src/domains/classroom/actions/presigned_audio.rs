//! Presigned audio actions: create, revoke, persist.
//!
//! Audio keeps one stable id across its whole lifecycle: it is created
//! presigned (a reserved storage slot plus a signed upload url, no bytes
//! yet), the client uploads out-of-band, and a later flow invalidates the
//! signed url, converts the bytes and re-persists the same entity as
//! persistent with a public url.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::common::{DomainError, EntityId};
use crate::domains::classroom::authorize::{authorize_consumption, EvaluatedPolicy};
use crate::domains::classroom::edges::{ownership, usage};
use crate::entity::{
    AudioProps, AudioStatus, Consumption, Entity, EntityProps, EntityTag, StorageRef,
    UsageConsumption,
};
use crate::kernel::{ClassroomDeps, UploadRequest};
use crate::repository::BaseEntityRepository;
use crate::saga::Saga;

use super::rollback_quietly;

// =============================================================================
// Create
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreatePresignedAudioRequest {
    pub owner_id: EntityId,
    pub mime_type: String,
    pub duration: Consumption,
    pub idempotency_key: Option<String>,
}

/// A freshly created presigned audio with its upload url.
#[derive(Debug, Clone)]
pub struct PresignedAudio {
    pub audio: Entity,
    pub presigned_url: String,
    pub expires_at: DateTime<Utc>,
    /// Policies the authorization engine evaluated, for quota display.
    pub evaluated: Vec<EvaluatedPolicy>,
}

/// Create a presigned audio slot for an upcoming upload.
///
/// Gates on the owner's entitlements first, then (in one saga) persists the
/// audio, records the consumption in the usage ledger and creates the
/// ownership edge.
pub async fn create_presigned_audio(
    request: CreatePresignedAudioRequest,
    deps: &ClassroomDeps,
) -> Result<PresignedAudio, DomainError> {
    info!(owner = %request.owner_id, mime = %request.mime_type, "creating presigned audio");

    let evaluated =
        authorize_consumption(deps.repository.as_ref(), request.owner_id, &request.duration)
            .await?;

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    match run_create(&request, &tx, deps).await {
        Ok((audio, presigned_url, expires_at)) => Ok(PresignedAudio {
            audio,
            presigned_url,
            expires_at,
            evaluated,
        }),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}

async fn run_create(
    request: &CreatePresignedAudioRequest,
    tx: &dyn BaseEntityRepository,
    deps: &ClassroomDeps,
) -> Result<(Entity, String, DateTime<Utc>), DomainError> {
    let signed = deps.storage.get_signed_url().await?;

    let props = EntityProps::Audio(AudioProps {
        status: AudioStatus::Presigned,
        mime_type: request.mime_type.clone(),
        duration: Some(request.duration),
        url: None,
        storage_ref: Some(StorageRef {
            bucket: signed.bucket.clone(),
            internal_id: signed.identifier.clone(),
            driver: signed.driver.clone(),
        }),
        metadata: serde_json::json!({
            "presigned_url": signed.url,
            "expires_at": signed.expires_at,
        }),
    });
    let draft = match &request.idempotency_key {
        Some(key) => Entity::draft_with_key(props, key.clone()),
        None => Entity::draft(props),
    };
    let audio = tx.set(draft).await?;

    usage::record_usage(
        tx,
        request.owner_id,
        &audio,
        UsageConsumption::direct(request.duration.unit, request.duration.value),
    )
    .await?;
    ownership::create_ownership(tx, request.owner_id, &audio).await?;

    Ok((audio, signed.url, signed.expires_at))
}

// =============================================================================
// Revoke
// =============================================================================

#[derive(Debug, Clone)]
pub struct RevokePresignedAudioRequest {
    pub owner_id: EntityId,
    pub audio_id: EntityId,
}

/// Revoke a presigned upload url before it is used.
///
/// Revoking the same audio twice fails the second time with
/// `InvalidState("already revoked")`.
pub async fn revoke_presigned_audio(
    request: RevokePresignedAudioRequest,
    deps: &ClassroomDeps,
) -> Result<Entity, DomainError> {
    info!(audio = %request.audio_id, "revoking presigned audio");

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    let outcome = async {
        let audio = load_audio(&tx, request.audio_id).await?;
        ownership::ensure_ownership_to_target_resource(&tx, request.owner_id, &audio).await?;
        invalidate_presigned(&tx, &audio).await
    }
    .await;

    match outcome {
        Ok(audio) => Ok(audio),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}

// =============================================================================
// Persist
// =============================================================================

#[derive(Debug, Clone)]
pub struct PersistAudioRequest {
    pub owner_id: EntityId,
    pub audio_id: EntityId,
}

/// Persist a presigned audio whose bytes were uploaded out-of-band: the
/// signed url is invalidated, the bytes converted and re-uploaded, and the
/// same entity re-persisted as persistent.
pub async fn persist_audio(
    request: PersistAudioRequest,
    deps: &ClassroomDeps,
) -> Result<Entity, DomainError> {
    info!(audio = %request.audio_id, "persisting uploaded audio");

    let saga = Saga::open();
    let tx = saga.wrap(deps.repository.clone());
    let outcome = async {
        let audio = load_audio(&tx, request.audio_id).await?;
        ownership::ensure_ownership_to_target_resource(&tx, request.owner_id, &audio).await?;
        let invalidated = invalidate_presigned(&tx, &audio).await?;
        persist_bytes(&tx, deps, &invalidated).await
    }
    .await;

    match outcome {
        Ok(audio) => Ok(audio),
        Err(err) => {
            rollback_quietly(&saga, &deps.repository).await;
            Err(err)
        }
    }
}

// =============================================================================
// Shared steps (also used by append_message)
// =============================================================================

pub(crate) async fn load_audio(
    repo: &dyn BaseEntityRepository,
    audio_id: EntityId,
) -> Result<Entity, DomainError> {
    repo.get(audio_id)
        .await?
        .filter(|e| e.tag() == EntityTag::Audio)
        .ok_or_else(|| DomainError::NotFound(format!("audio {audio_id}")))
}

/// Clear the ephemeral presigned fields. The first transactional write of
/// every flow that consumes an upload; a second invalidation of the same
/// audio is the "already revoked" case.
pub(crate) async fn invalidate_presigned(
    repo: &dyn BaseEntityRepository,
    audio: &Entity,
) -> Result<Entity, DomainError> {
    let props = audio
        .as_audio()
        .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("entity is not audio")))?;
    if props.status != AudioStatus::Presigned || props.presigned_url().is_none() {
        return Err(DomainError::InvalidState("already revoked".to_string()));
    }

    let mut cleared = props.clone();
    if let Some(fields) = cleared.metadata.as_object_mut() {
        fields.remove("presigned_url");
        fields.remove("expires_at");
    }
    let mut invalidated = audio.clone();
    invalidated.props = EntityProps::Audio(cleared);
    debug!(audio = %audio.id().unwrap_or_default(), "invalidated presigned url");
    repo.set(invalidated).await
}

/// Download the uploaded bytes, convert them, upload the converted result
/// and re-persist the audio as persistent with a public url.
pub(crate) async fn persist_bytes(
    repo: &dyn BaseEntityRepository,
    deps: &ClassroomDeps,
    audio: &Entity,
) -> Result<Entity, DomainError> {
    let props = audio
        .as_audio()
        .ok_or_else(|| DomainError::Internal(anyhow::anyhow!("entity is not audio")))?;
    let storage_ref = props.storage_ref.clone().ok_or_else(|| {
        DomainError::InvalidState("audio has no reserved storage slot".to_string())
    })?;

    let bytes = deps
        .storage
        .download(&storage_ref.internal_id)
        .await?
        .ok_or_else(|| {
            DomainError::NotFound(format!("uploaded bytes for audio {}", storage_ref.internal_id))
        })?;

    let audio_id = audio.id().unwrap_or_default();
    let converted = deps
        .multimedia
        .convert(crate::kernel::ConvertRequest {
            bytes,
            mime: props.mime_type.clone(),
            name: audio_id.to_string(),
        })
        .await?;

    let location = deps
        .storage
        .upload(UploadRequest {
            source: converted.bytes,
            metadata: serde_json::json!({ "audio_id": audio_id.to_string() }),
        })
        .await?;

    let mut persisted_props = props.clone();
    persisted_props.status = AudioStatus::Persistent;
    persisted_props.mime_type = converted.mime;
    persisted_props.duration = Some(Consumption::seconds(converted.duration));
    persisted_props.url = Some(format!(
        "{}://{}/{}",
        location.driver, location.bucket, location.identifier
    ));
    persisted_props.storage_ref = Some(StorageRef {
        bucket: location.bucket,
        internal_id: location.identifier,
        driver: location.driver,
    });

    let mut persisted = audio.clone();
    persisted.props = EntityProps::Audio(persisted_props);
    repo.set(persisted).await
}
