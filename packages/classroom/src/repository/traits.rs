// Trait definitions for the storage seam.
//
// These are INFRASTRUCTURE traits only - no business logic. Domain services
// (edges, authorization, actions) depend on BaseEntityRepository and never on
// a concrete store.
//
// Naming convention: Base* for trait names (e.g. BaseSubRepository)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityTag};
use crate::query::Query;

// =============================================================================
// Sub-Repository (one store per entity tag)
// =============================================================================

/// Contract every per-tag store implements. The backing engine (document
/// store, disk, memory) is opaque; it only has to evaluate the query
/// description language.
#[async_trait]
pub trait BaseSubRepository: Send + Sync {
    /// Fetch by id. Absent is `Ok(None)`, not an error.
    async fn get(&self, id: EntityId) -> Result<Option<Entity>>;

    /// Write an entity verbatim (meta already populated by the caller).
    async fn set(&self, entity: Entity) -> Result<Entity>;

    /// Delete by id. Removing an absent id is a no-op.
    async fn remove(&self, id: EntityId) -> Result<()>;

    /// Evaluate a query description against this store.
    async fn query(&self, query: &Query) -> Result<Vec<Entity>>;
}

// =============================================================================
// Identity Context
// =============================================================================

/// Mints ids and owns the id → tag mapping. The single source of truth for
/// "which store holds this id"; sub-repositories never know about each other.
#[async_trait]
pub trait BaseIdentityContext: Send + Sync {
    /// Mint a fresh id (not yet bound to any tag).
    async fn next_id(&self) -> Result<EntityId>;

    /// Record which tag's store owns this id. Happens before the first write.
    async fn bind(&self, id: EntityId, tag: EntityTag) -> Result<()>;

    /// Which tag owns this id, if any.
    async fn resolve(&self, id: EntityId) -> Result<Option<EntityTag>>;
}

// =============================================================================
// Entity Repository (the facade domain services depend on)
// =============================================================================

/// The repository surface domain code is written against. Implemented by
/// both the federated repository and its saga-wrapped transactional twin, so
/// edge services and flows work identically inside and outside a saga.
#[async_trait]
pub trait BaseEntityRepository: Send + Sync {
    /// Fetch by id across all stores. Unknown ids are `Ok(None)`.
    async fn get(&self, id: EntityId) -> Result<Option<Entity>, DomainError>;

    /// Persist an entity. Drafts get an id minted and audit meta stamped;
    /// existing entities keep `created_at` and get `updated_at` refreshed.
    async fn set(&self, entity: Entity) -> Result<Entity, DomainError>;

    /// Delete by id.
    async fn remove(&self, id: EntityId) -> Result<(), DomainError>;

    /// Evaluate a query against one tag's store, or against every store when
    /// `tag` is `None` (diagnostics only).
    async fn query(
        &self,
        query: &Query,
        tag: Option<EntityTag>,
    ) -> Result<Vec<Entity>, DomainError>;
}
