//! Entity envelope: tagged, versioned records with identity/audit metadata.
//!
//! Every persisted thing is an [`Entity`]: a `tag`-discriminated variant of
//! [`EntityProps`] wrapped with schema `version` and [`EntityMeta`]. There is
//! no inheritance anywhere in the graph; consumers dispatch by matching the
//! closed set of variants exhaustively.

pub mod props;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::EntityId;

pub use props::*;

/// Current schema revision stamped on freshly drafted entities. Older
/// revisions hydrated from storage keep their stored version so they can be
/// upgraded on read.
pub const ENTITY_VERSION: u16 = 1;

/// Discriminator for the closed set of entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTag {
    Audio,
    Classroom,
    Message,
    Participant,
    Transcript,
    Entitlement,
    Ownership,
    Participation,
    Source,
    OccursIn,
    Representation,
    Usage,
    Granted,
    PolicyAggregate,
    UsagePolicy,
}

/// Identity and audit metadata, populated by the repository on first write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: EntityId,
    /// Immutable once set.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every write (except verbatim rollback restores).
    pub updated_at: DateTime<Utc>,
}

/// Variant-specific payload. The closed sum over every persisted thing.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityProps {
    Audio(AudioProps),
    Classroom(ClassroomProps),
    Message(MessageProps),
    Participant(ParticipantProps),
    Transcript(TranscriptProps),
    Entitlement(EntitlementProps),
    Ownership(OwnershipProps),
    Participation(ParticipationProps),
    Source(SourceProps),
    OccursIn(OccursInProps),
    Representation(RepresentationProps),
    Usage(UsageProps),
    Granted(GrantedProps),
    PolicyAggregate(PolicyAggregateProps),
    UsagePolicy(UsagePolicyProps),
}

impl EntityProps {
    /// The variant discriminator.
    pub fn tag(&self) -> EntityTag {
        match self {
            EntityProps::Audio(_) => EntityTag::Audio,
            EntityProps::Classroom(_) => EntityTag::Classroom,
            EntityProps::Message(_) => EntityTag::Message,
            EntityProps::Participant(_) => EntityTag::Participant,
            EntityProps::Transcript(_) => EntityTag::Transcript,
            EntityProps::Entitlement(_) => EntityTag::Entitlement,
            EntityProps::Ownership(_) => EntityTag::Ownership,
            EntityProps::Participation(_) => EntityTag::Participation,
            EntityProps::Source(_) => EntityTag::Source,
            EntityProps::OccursIn(_) => EntityTag::OccursIn,
            EntityProps::Representation(_) => EntityTag::Representation,
            EntityProps::Usage(_) => EntityTag::Usage,
            EntityProps::Granted(_) => EntityTag::Granted,
            EntityProps::PolicyAggregate(_) => EntityTag::PolicyAggregate,
            EntityProps::UsagePolicy(_) => EntityTag::UsagePolicy,
        }
    }

    /// Serialize the payload fields for predicate evaluation.
    pub fn to_value(&self) -> anyhow::Result<serde_json::Value> {
        let value = match self {
            EntityProps::Audio(p) => serde_json::to_value(p)?,
            EntityProps::Classroom(p) => serde_json::to_value(p)?,
            EntityProps::Message(p) => serde_json::to_value(p)?,
            EntityProps::Participant(p) => serde_json::to_value(p)?,
            EntityProps::Transcript(p) => serde_json::to_value(p)?,
            EntityProps::Entitlement(p) => serde_json::to_value(p)?,
            EntityProps::Ownership(p) => serde_json::to_value(p)?,
            EntityProps::Participation(p) => serde_json::to_value(p)?,
            EntityProps::Source(p) => serde_json::to_value(p)?,
            EntityProps::OccursIn(p) => serde_json::to_value(p)?,
            EntityProps::Representation(p) => serde_json::to_value(p)?,
            EntityProps::Usage(p) => serde_json::to_value(p)?,
            EntityProps::Granted(p) => serde_json::to_value(p)?,
            EntityProps::PolicyAggregate(p) => serde_json::to_value(p)?,
            EntityProps::UsagePolicy(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }
}

macro_rules! props_accessor {
    ($fn_name:ident, $variant:ident, $props:ty) => {
        pub fn $fn_name(&self) -> Option<&$props> {
            match &self.props {
                EntityProps::$variant(p) => Some(p),
                _ => None,
            }
        }
    };
}

/// A tagged, versioned record.
///
/// Drafts (`meta == None`) have no id yet: the repository mints one and
/// stamps the audit timestamps on first write. Hydrated entities carry the
/// meta they were stored with, preserving `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub version: u16,
    pub meta: Option<EntityMeta>,
    /// When set on a draft, makes the first write a logical write-once: a
    /// second draft with the same key is rejected with a conflict.
    pub idempotency_key: Option<String>,
    pub props: EntityProps,
}

impl Entity {
    /// A draft at the current schema version. No id until first write.
    pub fn draft(props: EntityProps) -> Self {
        Self {
            version: ENTITY_VERSION,
            meta: None,
            idempotency_key: None,
            props,
        }
    }

    /// A write-once draft.
    pub fn draft_with_key(props: EntityProps, idempotency_key: impl Into<String>) -> Self {
        Self {
            version: ENTITY_VERSION,
            meta: None,
            idempotency_key: Some(idempotency_key.into()),
            props,
        }
    }

    /// Re-materialize a stored record. Preserves `id` and `created_at`;
    /// `version` stays whatever revision the record was written at.
    pub fn hydrate(
        version: u16,
        meta: EntityMeta,
        idempotency_key: Option<String>,
        props: EntityProps,
    ) -> Self {
        Self {
            version,
            meta: Some(meta),
            idempotency_key,
            props,
        }
    }

    pub fn tag(&self) -> EntityTag {
        self.props.tag()
    }

    pub fn id(&self) -> Option<EntityId> {
        self.meta.as_ref().map(|m| m.id)
    }

    pub fn is_draft(&self) -> bool {
        self.meta.is_none()
    }

    /// JSON projection used by sub-repositories to evaluate query predicates
    /// against dotted field paths (`props.source_id`, `meta.created_at`).
    pub fn to_value(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({
            "version": self.version,
            "tag": self.tag(),
            "meta": self.meta.as_ref().map(serde_json::to_value).transpose()?,
            "idempotency_key": self.idempotency_key,
            "props": self.props.to_value()?,
        }))
    }

    props_accessor!(as_audio, Audio, AudioProps);
    props_accessor!(as_classroom, Classroom, ClassroomProps);
    props_accessor!(as_message, Message, MessageProps);
    props_accessor!(as_participant, Participant, ParticipantProps);
    props_accessor!(as_transcript, Transcript, TranscriptProps);
    props_accessor!(as_entitlement, Entitlement, EntitlementProps);
    props_accessor!(as_ownership, Ownership, OwnershipProps);
    props_accessor!(as_participation, Participation, ParticipationProps);
    props_accessor!(as_source, Source, SourceProps);
    props_accessor!(as_occurs_in, OccursIn, OccursInProps);
    props_accessor!(as_representation, Representation, RepresentationProps);
    props_accessor!(as_usage, Usage, UsageProps);
    props_accessor!(as_granted, Granted, GrantedProps);
    props_accessor!(as_policy_aggregate, PolicyAggregate, PolicyAggregateProps);
    props_accessor!(as_usage_policy, UsagePolicy, UsagePolicyProps);
}
