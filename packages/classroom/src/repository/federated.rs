//! Federated repository: routes calls to the per-tag sub-repository.
//!
//! The registry is built once at startup from explicit configuration; there
//! is no reflection-based lookup. All domain services depend on this facade
//! (or its saga-wrapped twin) and never on a concrete store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::common::{DomainError, EntityId};
use crate::entity::{Entity, EntityMeta, EntityTag};
use crate::query::{where_eq, Query};

use super::traits::{BaseEntityRepository, BaseIdentityContext, BaseSubRepository};

/// Facade over one sub-repository per entity tag, sharing one identity
/// context.
pub struct FederatedRepository {
    identity: Arc<dyn BaseIdentityContext>,
    stores: HashMap<EntityTag, Arc<dyn BaseSubRepository>>,
}

impl FederatedRepository {
    pub fn builder(identity: Arc<dyn BaseIdentityContext>) -> FederatedRepositoryBuilder {
        FederatedRepositoryBuilder {
            identity,
            stores: HashMap::new(),
        }
    }

    pub fn identity(&self) -> &Arc<dyn BaseIdentityContext> {
        &self.identity
    }

    fn store_for(&self, tag: EntityTag) -> Result<&Arc<dyn BaseSubRepository>, DomainError> {
        self.stores.get(&tag).ok_or_else(|| {
            DomainError::Internal(anyhow::anyhow!("no sub-repository registered for {tag:?}"))
        })
    }

    /// Mint an id, bind it, and stamp audit meta onto a draft, without
    /// writing. The transactional wrapper uses this to know the new id
    /// before the write happens.
    pub(crate) async fn stamp(&self, mut entity: Entity) -> Result<Entity, DomainError> {
        let tag = entity.tag();
        if let Some(key) = entity.idempotency_key.clone() {
            let existing = self
                .store_for(tag)?
                .query(
                    &Query::builder()
                        .filter(where_eq("idempotency_key", key.as_str()))
                        .limit(1)
                        .build(),
                )
                .await?;
            if !existing.is_empty() {
                return Err(DomainError::Conflict(key));
            }
        }

        let id = self.identity.next_id().await?;
        self.identity.bind(id, tag).await?;
        let now = Utc::now();
        entity.meta = Some(EntityMeta {
            id,
            created_at: now,
            updated_at: now,
        });
        debug!(id = %id, tag = ?tag, "minted entity id");
        Ok(entity)
    }

    /// Write to the owning store without touching meta. Saga rollback uses
    /// this so restored snapshots stay byte-for-byte identical.
    pub(crate) async fn write(&self, entity: Entity) -> Result<Entity, DomainError> {
        let store = self.store_for(entity.tag())?;
        Ok(store.set(entity).await?)
    }

    /// Verbatim snapshot write, rollback only.
    pub(crate) async fn restore(&self, snapshot: Entity) -> Result<(), DomainError> {
        if snapshot.is_draft() {
            return Err(DomainError::Internal(anyhow::anyhow!(
                "cannot restore a draft snapshot"
            )));
        }
        self.write(snapshot).await?;
        Ok(())
    }
}

#[async_trait]
impl BaseEntityRepository for FederatedRepository {
    async fn get(&self, id: EntityId) -> Result<Option<Entity>, DomainError> {
        // Unknown ids resolve to nothing rather than erroring.
        let Some(tag) = self.identity.resolve(id).await? else {
            return Ok(None);
        };
        let Some(store) = self.stores.get(&tag) else {
            return Ok(None);
        };
        Ok(store.get(id).await?)
    }

    async fn set(&self, entity: Entity) -> Result<Entity, DomainError> {
        let mut entity = entity;
        let entity = match entity.meta.take() {
            None => self.stamp(entity).await?,
            Some(meta) => {
                entity.meta = Some(EntityMeta {
                    id: meta.id,
                    created_at: meta.created_at,
                    updated_at: Utc::now(),
                });
                entity
            }
        };
        self.write(entity).await
    }

    async fn remove(&self, id: EntityId) -> Result<(), DomainError> {
        let Some(tag) = self.identity.resolve(id).await? else {
            debug!(id = %id, "remove of unknown id is a no-op");
            return Ok(());
        };
        self.store_for(tag)?.remove(id).await?;
        Ok(())
    }

    async fn query(
        &self,
        query: &Query,
        tag: Option<EntityTag>,
    ) -> Result<Vec<Entity>, DomainError> {
        match tag {
            Some(tag) => Ok(self.store_for(tag)?.query(query).await?),
            None => {
                // Full-graph scan, used rarely (diagnostics).
                let mut results = Vec::new();
                for store in self.stores.values() {
                    results.extend(store.query(query).await?);
                }
                Ok(results)
            }
        }
    }
}

/// Builds the tag → store registry once, from explicit configuration.
pub struct FederatedRepositoryBuilder {
    identity: Arc<dyn BaseIdentityContext>,
    stores: HashMap<EntityTag, Arc<dyn BaseSubRepository>>,
}

impl FederatedRepositoryBuilder {
    pub fn register(mut self, tag: EntityTag, store: Arc<dyn BaseSubRepository>) -> Self {
        self.stores.insert(tag, store);
        self
    }

    pub fn build(self) -> FederatedRepository {
        FederatedRepository {
            identity: self.identity,
            stores: self.stores,
        }
    }
}
