//! Variant-specific entity payloads.
//!
//! One props struct per entity tag. Relationship entities (ownership,
//! participation, source, occurs-in, representation, usage, granted, policy
//! aggregate) are immutable append-only facts: once written they are never
//! mutated in place. Only node entities (audio, classroom, participant)
//! transition their props over their lifecycle.

use serde::{Deserialize, Serialize};

use crate::common::EntityId;
use crate::entity::EntityTag;

// ============================================================================
// Consumption model
// ============================================================================

/// Unit of a measured consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionUnit {
    Seconds,
    Characters,
    Tokens,
}

/// A requested or measured amount of consumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub unit: ConsumptionUnit,
    pub value: f64,
}

impl Consumption {
    pub fn seconds(value: f64) -> Self {
        Self {
            unit: ConsumptionUnit::Seconds,
            value,
        }
    }
}

/// A ledger entry's consumption, with the normalization bookkeeping that
/// produced `value` from `raw_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageConsumption {
    pub unit: ConsumptionUnit,
    pub value: f64,
    pub raw_value: f64,
    pub normalization_factor: f64,
    pub precision: u8,
}

impl UsageConsumption {
    /// A 1:1 entry where the recorded value is the raw value.
    pub fn direct(unit: ConsumptionUnit, value: f64) -> Self {
        Self {
            unit,
            value,
            raw_value: value,
            normalization_factor: 1.0,
            precision: 0,
        }
    }
}

// ============================================================================
// Node entities
// ============================================================================

/// Lifecycle status of an audio entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    /// Created with a signed upload url; no bytes persisted yet.
    Presigned,
    /// Bytes converted and stored; `url` is the public location.
    Persistent,
}

/// Where the stored bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    pub bucket: String,
    pub internal_id: String,
    pub driver: String,
}

/// Audio content. The entity id is stable across the presigned → persistent
/// transition; only these props change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioProps {
    pub status: AudioStatus,
    pub mime_type: String,
    pub duration: Option<Consumption>,
    pub url: Option<String>,
    pub storage_ref: Option<StorageRef>,
    /// Free-form; carries ephemeral `presigned_url` / `expires_at` while
    /// status is presigned.
    pub metadata: serde_json::Value,
}

impl AudioProps {
    /// The ephemeral signed upload url, if still present.
    pub fn presigned_url(&self) -> Option<&str> {
        self.metadata.get("presigned_url").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomProps {
    pub name: String,
}

/// A message is a bare envelope: its content is reached only through a
/// `Source` edge, never embedded. New content types are added by pointing a
/// `Source` edge at a new entity variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageProps {}

/// Maps an external subject id onto an internal graph id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProps {
    pub subject_id: String,
}

/// Derived text content (transcription or translation target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptProps {
    pub text: String,
    pub language: String,
}

// ============================================================================
// Relationship entities
// ============================================================================

/// Who may administer a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub target_type: EntityTag,
}

/// Classroom membership role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationRole {
    Learner,
    Tutor,
}

/// Classroom membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub role: ParticipationRole,
}

/// Content type a `Source` edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Audio,
    Transcript,
}

/// Message → content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProps {
    pub source_id: EntityId,
    pub source_type: SourceType,
    pub target_id: EntityId,
}

/// Message → classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccursInProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
}

/// Kind of derived content a representation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationType {
    Transcription,
    Translation,
}

/// Derived content → original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub target_type: EntityTag,
    #[serde(rename = "type")]
    pub kind: RepresentationType,
}

/// A ledger entry of consumption. Current usage for any window is always a
/// live summation over these entries, never a mutable counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub target_type: EntityTag,
    pub consumption: UsageConsumption,
}

/// Participant → entitlement, with precedence and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub priority: i32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Entitlement → usage policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAggregateProps {
    pub source_id: EntityId,
    pub target_id: EntityId,
}

/// Aggregation window of a usage policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    PerDay,
    PerWeek,
    PerMonth,
}

/// The quota rule itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePolicyProps {
    pub aggregation: Aggregation,
    pub max_consumption: f64,
    pub unit: ConsumptionUnit,
}

// ============================================================================
// Entitlement node
// ============================================================================

/// The thing a grant points at. Carries only a human-readable label; the
/// constraints live in attached usage policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementProps {
    pub name: String,
}
